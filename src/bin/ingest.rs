//! Schema Ingest CLI
//!
//! Extracts node definitions from a component source tree and replaces the
//! relational store with the result.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use flow_schemas::ingest::{run_pipeline, Ingestor};
use flow_schemas::{FlowSchemasConfig, Store};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-ingest")]
#[command(about = "Extract node schemas and rebuild the store")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Component source tree (overrides source.root)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Example-graph corpus (overrides templates.root)
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Store file (overrides store.path)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Extract and report without touching the store
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = FlowSchemasConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(source) = cli.source {
        config.source.root = Some(source);
    }
    if let Some(templates) = cli.templates {
        config.templates.root = Some(templates);
    }
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    if let Some(path) = cli.save_config {
        config.save(&path)?;
        println!("💾 Configuration written to {}", path.display());
        return Ok(());
    }

    if cli.dry_run {
        let root = config.source_root().context("no source root configured")?;
        let report = Ingestor::from_config(&config).ingest(&root)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("🔍 Dry run over {}", root.display());
            println!("  📄 {} units scanned", report.scanned);
            println!("  ✅ {} definitions extracted", report.definitions.len());
            for skipped in &report.skipped {
                println!("  ⚠️  {} - {}", skipped.path.display(), skipped.reason);
            }
            println!("  🔐 corpus checksum {}", report.checksum);
        }
        return Ok(());
    }

    let store_path = config.store_path();
    let mut store = Store::create(&store_path)
        .with_context(|| format!("opening store {}", store_path.display()))?;
    let report = run_pipeline(&config, &mut store)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📦 Store rebuilt at {}", store_path.display());
    println!("  📄 {} units scanned", report.scanned);
    println!("  ✅ {} definitions written", report.write.written);
    if report.templates > 0 {
        println!("  🗺️  {} templates loaded, {} definitions enriched", report.templates, report.enriched);
    }
    for skipped in &report.skipped {
        println!("  ⚠️  skipped {} - {}", skipped.path.display(), skipped.reason);
    }
    for failure in &report.write.failures {
        println!("  ❌ not written {} - {}", failure.definition, failure.error);
    }
    println!("  🔐 corpus checksum {}", report.checksum);
    Ok(())
}
