//! Schema Query CLI
//!
//! Serves the query surface over a built store. Every command prints JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use flow_schemas::flow::SkeletonKind;
use flow_schemas::{CandidateFlow, Catalog, FlowSchemasConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-query")]
#[command(about = "Query node schemas, templates and flow compatibility")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store file (overrides store.path)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Compact JSON output
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    /// Definitions this one can feed
    Out,
    /// Definitions that can feed this one
    In,
}

#[derive(Subcommand)]
enum Commands {
    /// List categories with member counts
    Categories,

    /// List definitions
    List {
        #[arg(long)]
        category: Option<String>,
    },

    /// Fuzzy search definitions
    Search { query: String },

    /// Ready-to-instantiate node for a definition
    Get {
        name: String,
        #[arg(long)]
        instance_id: Option<String>,
    },

    /// List flow templates
    Templates {
        #[arg(long)]
        kind: Option<String>,
    },

    /// Fetch one flow template
    Template { name: String },

    /// Fuzzy search flow templates
    TemplateSearch { query: String },

    /// Type-compatible neighbors of a definition
    Compatible {
        name: String,
        #[arg(long, value_enum, default_value = "out")]
        direction: Direction,
    },

    /// Validate a candidate flow (JSON with nodes and edges)
    Validate { file: PathBuf },

    /// Instantiate an example composition
    Skeleton { kind: String },

    /// Input types an output type can feed
    TypesAccepted { output_type: String },

    /// Concrete types satisfying an input type
    TypesSatisfying { input_type: String },

    /// Snapshot metadata
    Info,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn print<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", out);
    Ok(())
}

/// Returns `false` when a validated flow has errors
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = FlowSchemasConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }
    let catalog = Catalog::open(&config)
        .with_context(|| format!("loading store {}", config.store_path().display()))?;
    let compact = cli.compact;

    match cli.command {
        Commands::Categories => print(&catalog.categories(), compact)?,
        Commands::List { category } => print(&catalog.list(category.as_deref()), compact)?,
        Commands::Search { query } => print(&catalog.search(&query), compact)?,
        Commands::Get { name, instance_id } => print(&catalog.instance(&name, instance_id.as_deref())?, compact)?,
        Commands::Templates { kind } => print(&catalog.templates(kind.as_deref()), compact)?,
        Commands::Template { name } => print(catalog.template(&name)?, compact)?,
        Commands::TemplateSearch { query } => print(&catalog.search_templates(&query), compact)?,
        Commands::Compatible { name, direction } => {
            let links = match direction {
                Direction::Out => catalog.compatible_targets(&name)?,
                Direction::In => catalog.compatible_sources(&name)?,
            };
            print(&links, compact)?
        }
        Commands::Validate { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let flow: CandidateFlow = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            let result = catalog.validate(&flow);
            print(&result, compact)?;
            return Ok(result.valid);
        }
        Commands::Skeleton { kind } => {
            let kind: SkeletonKind = kind.parse()?;
            print(&catalog.skeleton(kind)?, compact)?
        }
        Commands::TypesAccepted { output_type } => print(&catalog.types_accepted_by(&output_type), compact)?,
        Commands::TypesSatisfying { input_type } => print(&catalog.types_that_satisfy(&input_type), compact)?,
        Commands::Info => print(
            &serde_json::json!({
                "store": config.store_path(),
                "generatedAt": catalog.generated_at(),
                "checksum": catalog.checksum(),
                "definitions": catalog.definitions().len(),
                "resolverTypes": catalog.resolver().len(),
            }),
            compact,
        )?,
    }
    Ok(true)
}
