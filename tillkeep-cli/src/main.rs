//! tillkeep CLI - operator tools for the tillkeep core.
//!
//! # Commands
//!
//! - `tillkeep fingerprint [JSON]` - Canonical form and fingerprint of a document
//! - `tillkeep sign <FILE>` - Signature header value for a webhook body
//! - `tillkeep verify --signature <SIG> <FILE>` - Check a webhook signature
//! - `tillkeep reconcile --mode poll|daily --shipments <FILE>` - Run one reconciliation pass

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Read};
use std::path::PathBuf;
use tillkeep_config::{ConfigService, FileFormat};

mod commands;
mod error;

use commands::{fingerprint, reconcile, webhook};
use error::{CliError, CliResult};

/// tillkeep - idempotent POS mutations and delivery reconciliation
#[derive(Parser)]
#[command(name = "tillkeep")]
#[command(version)]
#[command(about = "Operator tools for tillkeep: fingerprints, webhook signatures, reconciliation")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or .env), overridden by TILLKEEP_* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical form and fingerprint of a JSON document
    #[command(alias = "fp")]
    Fingerprint {
        /// JSON document; read from stdin when omitted
        json: Option<String>,

        /// Also derive an id as PREFIX-<first 10 hash chars>
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Sign a webhook body with the shared secret
    Sign {
        /// File holding the raw body
        file: PathBuf,

        #[arg(long, env = "TILLKEEP_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Verify a webhook body against a signature
    Verify {
        /// File holding the raw body
        file: PathBuf,

        /// Signature header value, with or without the sha256= prefix
        #[arg(long)]
        signature: String,

        #[arg(long, env = "TILLKEEP_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Run one reconciliation pass against the delivery provider
    Reconcile {
        #[arg(long, value_enum, default_value = "poll")]
        mode: reconcile::Mode,

        /// JSON file holding the shipments to reconcile
        #[arg(long)]
        shipments: PathBuf,

        /// Write updated shipments back to the file
        #[arg(long)]
        write: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> CliResult<ConfigService> {
    let mut builder = ConfigService::builder().load_dotenv(None);
    if let Some(path) = path {
        let format = FileFormat::detect(path)?;
        builder = builder.add_file(path.display().to_string(), format);
    }
    Ok(builder.build()?)
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Fingerprint { json, prefix } => {
            let input = match json {
                Some(json) => json,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            print_json(&fingerprint::execute(&input, prefix.as_deref())?)
        }

        Commands::Sign { file, secret } => {
            let body = std::fs::read(&file)?;
            println!("{}", webhook::sign_body(&body, &secret)?);
            Ok(())
        }

        Commands::Verify {
            file,
            signature,
            secret,
        } => {
            let body = std::fs::read(&file)?;
            webhook::verify_body(&body, &signature, &secret)?;
            println!("  {} {}", "✓".green().bold(), "signature valid".green());
            Ok(())
        }

        Commands::Reconcile {
            mode,
            shipments,
            write,
        } => {
            let config = load_config(cli.config.as_ref())?.core()?;
            let summary = reconcile::execute(&config, &shipments, mode, write).await?;
            print_json(&summary)?;

            if summary.failed > 0 {
                eprintln!(
                    "  {} {} of {} shipments could not be queried",
                    "⚠".yellow().bold(),
                    summary.failed,
                    summary.examined
                );
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        let label = match e {
            CliError::Rejected(_) => "Rejected:",
            _ => "Error:",
        };
        eprintln!("\n  {} {}\n", label.red().bold(), e);
        std::process::exit(1);
    }
}
