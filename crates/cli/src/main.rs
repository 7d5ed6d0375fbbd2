mod etag;
mod runner;
mod scenario;
mod tap;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracechain_ledger::LedgerConfig;
use tracechain_storage::conformance::run_conformance_suite;
use tracechain_storage::MemoryStorage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Food supply chain traceability ledger.
#[derive(Parser)]
#[command(
    name = "tracechain",
    version,
    about = "Food supply chain traceability ledger"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a ledger configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file (.toml or .json) against a fresh in-memory ledger
    Run {
        /// Path to the scenario file
        scenario: PathBuf,
    },

    /// Run the storage conformance suite against the in-memory backend
    Conformance,

    /// Print the effective ledger configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), cli.output, cli.quiet);
    init_tracing(&config.log.filter);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                cli.output,
                cli.quiet,
            );
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Run { scenario } => {
            rt.block_on(runner::cmd_run(&scenario, &config, cli.output, cli.quiet));
        }
        Commands::Conformance => {
            rt.block_on(cmd_conformance(cli.output, cli.quiet));
        }
        Commands::Config => {
            cmd_config(&config, cli.output, cli.quiet);
        }
    }
}

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> LedgerConfig {
    let Some(path) = path else {
        return LedgerConfig::default();
    };
    match LedgerConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout stays machine readable. `RUST_LOG` wins over
/// the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

async fn cmd_conformance(output: OutputFormat, quiet: bool) {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;

    match output {
        OutputFormat::Json => {
            let results: Vec<serde_json::Value> = report
                .results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "category": r.category,
                        "name": r.name,
                        "passed": r.passed,
                        "message": r.message,
                    })
                })
                .collect();
            let doc = serde_json::json!({
                "passed": report.passed,
                "failed": report.failed,
                "total": report.total,
                "results": results,
            });
            match serde_json::to_string_pretty(&doc) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    report_error(&format!("serialization error: {}", e), output, quiet);
                    process::exit(1);
                }
            }
        }
        OutputFormat::Text => {
            let mut tap = tap::Tap::new();
            for r in &report.results {
                let desc = format!("{}/{}", r.category, r.name);
                match &r.message {
                    None if r.passed => tap.ok(desc),
                    message => tap.not_ok(desc, message.clone().unwrap_or_default()),
                }
            }
            tap.finish();
        }
    }

    if report.failed > 0 {
        process::exit(1);
    }
}

fn cmd_config(config: &LedgerConfig, output: OutputFormat, quiet: bool) {
    let rendered = match output {
        OutputFormat::Text => config.to_toml_string().map_err(|e| e.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
    };
    match rendered {
        Ok(s) => println!("{}", s.trim_end()),
        Err(msg) => {
            report_error(&format!("serialization error: {}", msg), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
