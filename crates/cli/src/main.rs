mod commands;
mod input;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use towerline_engine::EngineConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Towerline decision engine.
#[derive(Parser)]
#[command(name = "towerline", version, about = "Towerline decision engine")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Log filter, e.g. `info` or `towerline_engine=debug`. RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List metric definitions from the catalog
    Catalog {
        /// Only metrics owned by this domain (FDP, MDP, CDP)
        #[arg(long)]
        domain: Option<String>,
        /// Only metrics that can back a decision
        #[arg(long)]
        actionable: bool,
        /// Only metrics computed client-side
        #[arg(long)]
        trust_risk: bool,
    },

    /// Synthesize auto decisions from a live facts JSON file
    Synthesize {
        /// Path to the facts JSON file
        #[arg(long)]
        facts: PathBuf,
        /// Tenant the facts belong to
        #[arg(long, default_value = "default")]
        tenant: String,
        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Evaluate the escalation policy against decisions in a JSON file
    Escalation {
        /// Path to a decision JSON file (one object or an array)
        #[arg(long)]
        decision: PathBuf,
        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Collapse a batch of decisions to one per dedupe key
    Dedupe {
        /// Path to a decisions JSON file (one object or an array)
        #[arg(long)]
        input: PathBuf,
    },

    /// Start the decision HTTP API backed by an in-memory store
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// JSON array of decision rows to load at startup
        #[arg(long)]
        seed: Option<PathBuf>,
        /// JSON object mapping tenant ids to live facts
        #[arg(long)]
        facts: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                report_error(&e.to_string(), cli.output);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let result = match cli.command {
        Commands::Catalog {
            domain,
            actionable,
            trust_risk,
        } => commands::catalog::cmd_catalog(domain.as_deref(), actionable, trust_risk, cli.output),
        Commands::Synthesize { facts, tenant, at } => commands::synthesize::cmd_synthesize(
            &facts,
            &tenant,
            at.as_deref(),
            &config,
            cli.output,
        ),
        Commands::Escalation { decision, at } => {
            commands::escalation::cmd_escalation(&decision, at.as_deref(), &config, cli.output)
        }
        Commands::Dedupe { input } => commands::dedupe::cmd_dedupe(&input, cli.output),
        Commands::Serve { port, seed, facts } => match tokio::runtime::Runtime::new() {
            Ok(rt) => rt
                .block_on(serve::start_server(port, config, seed, facts))
                .map_err(|e| format!("server error: {e}")),
            Err(e) => Err(format!("failed to create tokio runtime: {e}")),
        },
    };

    if let Err(msg) = result {
        report_error(&msg, cli.output);
        process::exit(1);
    }
}

/// Logs go to stderr so `--output json` stays machine-readable.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("serialization: {e}"))?;
    println!("{}", json);
    Ok(())
}
