use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;
use serde_json::{Map, Value};

use cyphergate::config::CompilerConfig;
use cyphergate::schema::Schema;
use cyphergate::selection::SelectionNode;
use cyphergate::translate::{AuthContext, Translator};

/// Cyphergate - compile a graph API request into parameterized Cypher
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema definition (YAML)
    #[arg(long)]
    schema: PathBuf,

    /// Request to compile (JSON)
    #[arg(long)]
    request: PathBuf,

    /// Compiler configuration (YAML). Defaults to CYPHERGATE_* environment variables
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Read,
    Aggregate,
    Reference,
}

#[derive(Debug, Deserialize)]
struct Request {
    operation: Operation,
    entity: String,
    selection: SelectionNode,
    #[serde(default)]
    auth: AuthContext,
    #[serde(default)]
    identity: Option<Map<String, Value>>,
}

fn main() -> anyhow::Result<()> {
    // Defaults to WARN so stdout stays clean; override with RUST_LOG
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CompilerConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CompilerConfig::from_env().context("loading config from environment")?,
    };
    let schema = Schema::from_yaml_file(&cli.schema)
        .with_context(|| format!("loading schema {}", cli.schema.display()))?;
    let raw = std::fs::read_to_string(&cli.request)
        .with_context(|| format!("reading request {}", cli.request.display()))?;
    let request: Request = serde_json::from_str(&raw).context("parsing request")?;

    let translator = Translator::new(&schema, &config);
    let query = match request.operation {
        Operation::Read => translator.compile_read(&request.entity, &request.selection, &request.auth)?,
        Operation::Aggregate => translator.compile_aggregate(&request.entity, &request.selection, &request.auth)?,
        Operation::Reference => {
            let Some(identity) = &request.identity else {
                bail!("reference requests need an `identity` object");
            };
            translator.compile_reference(&request.entity, identity, &request.selection, &request.auth)?
        }
    };
    log::info!("Compiled {:?} of {}", request.operation, request.entity);

    println!("{}", serde_json::to_string_pretty(&query)?);
    Ok(())
}
