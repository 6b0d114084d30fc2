//! Switchyard Recipes - Entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use switchyard_config::{ConfigLoader, RuntimeConfig};
use switchyard_core::{Contract, SchemaRegistry};
use switchyard_recipes::{InMemoryPersistence, RecipeStore};
use switchyard_telemetry::{init_logging, JsonLineSink};
use tracing::{error, info};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Contract document, overriding the configuration.
    contract: Option<String>,
    /// Listen address, overriding the configuration.
    listen: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config: None,
            contract: None,
            listen: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => parsed.config = args.next().map(PathBuf::from),
                "--contract" => parsed.contract = args.next(),
                "--listen" | "-l" => parsed.listen = args.next(),
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("switchyard-recipes {}", switchyard_recipes::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        parsed
    }
}

fn print_help() {
    println!(
        r"Switchyard Recipes - recipes backend service

USAGE:
    switchyard-recipes [OPTIONS]

OPTIONS:
    -c, --config <PATH>      Path to configuration file (TOML or JSON)
        --contract <PATH>    Contract document (YAML, JSON or TOML)
    -l, --listen <ADDR>      Listen address, e.g. 0.0.0.0:8001
    -h, --help               Print help information
    -v, --version            Print version information

ENVIRONMENT VARIABLES:
    SWITCHYARD__SERVER__LISTEN_ADDR           Listen address (default: 0.0.0.0:8080)
    SWITCHYARD__CONTRACT__PATH                Contract document (default: contract.yaml)
    SWITCHYARD__TELEMETRY__LOGGING__LEVEL     Log level (default: info)
    SWITCHYARD__TELEMETRY__LOGGING__FORMAT    json or pretty (default: json)
"
    );
}

fn load_config(args: &Args) -> anyhow::Result<RuntimeConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path)?;
    }
    loader = loader.with_dotenv()?.with_env_prefix("SWITCHYARD");
    if let Some(contract) = &args.contract {
        loader = loader.with_contract_path(contract.clone());
    }
    if let Some(listen) = &args.listen {
        loader = loader.with_listen_addr(listen.clone());
    }
    Ok(loader.load()?)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args).context("failed to load configuration")?;
    init_logging(&config.telemetry.log_config())?;

    info!("Starting switchyard recipes v{}", switchyard_recipes::VERSION);
    let contract = Contract::load(&config.contract.path, &SchemaRegistry::new())
        .with_context(|| format!("failed to load contract {}", config.contract.path))?;

    let persistence = Arc::new(InMemoryPersistence::new(Arc::new(RecipeStore::new())));
    let runtime = switchyard_recipes::runtime(&contract, persistence, JsonLineSink::shared())?
        .with_max_body_bytes(config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr()?).await?;
    runtime
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("switchyard-recipes: {e:#}");
        error!("Service error: {:#}", e);
        std::process::exit(1);
    }
}
