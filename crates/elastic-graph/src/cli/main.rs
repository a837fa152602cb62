//! Elastic Graph query compiler.
//!
//! Builds a connection from a JSON definition and an index mapping, then
//! prints either the compiled search body for a request or the argument tree
//! the connection exposes.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use helios_elastic_graph::{ConnectionConfig, MappingSchema, SchemaRegistry};
use serde_json::Value;
use tracing::{info, warn};

/// Command line options.
#[derive(Debug, Parser)]
#[command(name = "elastic-graph-compile")]
#[command(about = "Compile connection arguments to Elasticsearch query DSL")]
struct Cli {
    /// Connection definition (JSON).
    #[arg(short, long, env = "ELASTIC_GRAPH_CONFIG")]
    config: PathBuf,

    /// Index mapping (JSON, as returned by `GET <index>/_mapping`).
    #[arg(short, long, env = "ELASTIC_GRAPH_MAPPING")]
    mapping: PathBuf,

    /// Request arguments (JSON). Reads `{}` when omitted.
    #[arg(short, long)]
    args: Option<PathBuf>,

    /// Print the argument tree instead of compiling a request.
    #[arg(long, default_value = "false")]
    schema: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ELASTIC_GRAPH_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_elastic_graph={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = ConnectionConfig::from_path(&cli.config)?;
    let mapping = read_json(&cli.mapping)?;
    let schema = MappingSchema::from_mapping(&mapping)?;
    let registry = SchemaRegistry::new().with_document(config.document.clone(), &schema);

    let document = registry.document(&config.document)?;
    for (field, reason) in document.excluded() {
        warn!(field = %field, reason = %reason, "Field excluded from the document");
    }

    let connection = config.build(&registry)?;
    info!(
        connection = %connection.name(),
        index = %connection.index(),
        backends = connection.pipeline().backends().len(),
        "Connection built"
    );

    let output = if cli.schema {
        serde_json::to_string_pretty(connection.arguments())?
    } else {
        let args = match &cli.args {
            Some(path) => read_json(path)?,
            None => Value::Object(Default::default()),
        };
        let query = connection.compile(&args)?;
        serde_json::to_string_pretty(&query.body)?
    };
    println!("{}", output);

    Ok(())
}
