//! Configuration management for ingest and query
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (flow-schemas.toml)
//! - Environment variables (FLOW_SCHEMAS__<SECTION>__<KEY>)
//!
//! ## Example config file (flow-schemas.toml):
//! ```toml
//! [source]
//! root = "./packages/components/nodes"
//! extensions = ["ts", "js"]
//! sentinel = "implements INode"
//!
//! [store]
//! path = "flow-schemas.sqlite"
//!
//! [templates]
//! root = "./packages/server/marketplaces"
//! enrich_base_classes = true
//!
//! [compat]
//! authority = "table"
//!
//! [query]
//! search_limit = 20
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compat::ChainAuthority;
use crate::error::Result;
use crate::extract::DEFAULT_SENTINEL;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowSchemasConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub compat: CompatConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

/// Component source tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// File extensions treated as source units
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Substring marking a unit that declares a component
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Example-graph corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Replace a definition's base classes with a longer chain seen in templates
    #[serde(default = "default_true")]
    pub enrich_base_classes: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatConfig {
    #[serde(default)]
    pub authority: ChainAuthority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_extensions() -> Vec<String> {
    vec!["ts".to_string(), "js".to_string()]
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("flow-schemas.sqlite")
}

fn default_true() -> bool {
    true
}

fn default_search_limit() -> usize {
    20
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            extensions: default_extensions(),
            sentinel: default_sentinel(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: None,
            enrich_base_classes: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
        }
    }
}

impl FlowSchemasConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "flow-schemas.toml",
            ".flow-schemas.toml",
            "config/flow-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "flow-schemas", "flow-schemas") {
            let xdg_config = dirs.config_dir().join("flow-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("FLOW_SCHEMAS")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("source.extensions")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Store path, resolved against the working directory
    pub fn store_path(&self) -> PathBuf {
        resolve(&self.store.path)
    }

    pub fn source_root(&self) -> Option<PathBuf> {
        self.source.root.as_deref().map(resolve)
    }

    pub fn templates_root(&self) -> Option<PathBuf> {
        self.templates.root.as_deref().map(resolve)
    }
}

fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlowSchemasConfig::default();
        assert_eq!(config.source.extensions, vec!["ts", "js"]);
        assert_eq!(config.source.sentinel, "implements INode");
        assert_eq!(config.store.path, PathBuf::from("flow-schemas.sqlite"));
        assert!(config.templates.enrich_base_classes);
        assert_eq!(config.compat.authority, ChainAuthority::Table);
        assert_eq!(config.query.search_limit, 20);
    }

    #[test]
    fn test_serialize_config() {
        let config = FlowSchemasConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[compat]"));
        assert!(toml_str.contains("authority = \"table\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[store]\npath = \"/tmp/x.sqlite\"\n[compat]\nauthority = \"merged\"\n[query]\nsearch_limit = 5\n",
        )
        .unwrap();

        let config = FlowSchemasConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/tmp/x.sqlite"));
        assert_eq!(config.compat.authority, ChainAuthority::Merged);
        assert_eq!(config.query.search_limit, 5);
        assert_eq!(config.source.extensions, vec!["ts", "js"]);
    }

    #[test]
    fn test_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = FlowSchemasConfig::default();
        config.query.search_limit = 7;
        config.save(&path).unwrap();

        let loaded = FlowSchemasConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.query.search_limit, 7);
    }
}
