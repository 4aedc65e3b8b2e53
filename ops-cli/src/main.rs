//! kimctl: operator CLI of the KIM gateway
//!
//! Usage:
//!   kimctl check-format mail.eml
//!   kimctl inspect mail.eml --user praxis@kim.telematik
//!   kimctl inspect --certificate enc.der
//!   kimctl codes X01
//!   kimctl --config /etc/kim-gateway/gateway.yaml config

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config_engine::ConfigLoader;
use logger_redacted::init_tracing;
use serde::Serialize;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "kimctl")]
#[command(about = "Operator tooling for the KIM mail gateway")]
struct Cli {
    /// Gateway configuration file (YAML or TOML)
    #[arg(long, env = "KIM_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a stored mail is a well-formed KIM envelope
    CheckFormat { file: PathBuf },

    /// List the recipients of a KIM mail's envelope
    Inspect {
        file: PathBuf,

        /// Show the issuer/serial targets of this mailbox
        #[arg(long)]
        user: Option<String>,

        /// The file is a DER certificate, not a mail
        #[arg(long, conflicts_with = "user")]
        certificate: bool,
    },

    /// Look up KIM error codes by id prefix
    Codes { prefix: Option<String> },

    /// Print the effective configuration
    Config,
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("loading configuration")?;
    let _guard = init_tracing(&config.logging)?;
    debug!(command = ?cli.command, "kimctl started");

    match cli.command {
        Command::CheckFormat { file } => {
            let report = ops_cli::check_format(&read(&file)?)?;
            if cli.json {
                return print_json(&report);
            }
            println!("valid:      {}", report.valid);
            println!("version:    {}", report.version.as_deref().unwrap_or("-"));
            println!("recipients: {}", report.recipients);
            for code in &report.codes {
                println!("  {code}");
            }
        }
        Command::Inspect {
            file,
            user,
            certificate,
        } => {
            let bytes = read(&file)?;
            if certificate {
                let summary = ops_cli::inspect_certificate(&bytes)?;
                if cli.json {
                    return print_json(&summary);
                }
                println!("subject:   {}", summary.subject);
                println!("issuer:    {}", summary.issuer_serial.issuer);
                println!("serial:    {}", summary.issuer_serial.serial);
                println!("ecc:       {}", summary.ecc);
                println!("not after: {}", summary.not_after);
                return Ok(());
            }

            let report = ops_cli::inspect(&bytes, user.as_deref())?;
            if cli.json {
                return print_json(&report);
            }
            println!("recipient infos:");
            for target in &report.recipient_infos {
                println!("  {target}");
            }
            println!("recipient emails:");
            for entry in &report.recipient_emails {
                match &entry.issuer_serial {
                    Some(issuer_serial) => println!("  {} -> {issuer_serial}", entry.email),
                    None => println!("  {} -> (subject key identifier)", entry.email),
                }
            }
            if let (Some(user), Some(targets)) = (user, &report.targets) {
                println!("targets of {user}: {}", targets.len());
            }
        }
        Command::Codes { prefix } => {
            let codes = ops_cli::codes(prefix.as_deref());
            if cli.json {
                return print_json(&codes);
            }
            for code in codes {
                println!("{code}");
            }
        }
        Command::Config => {
            if cli.json {
                return print_json(&config);
            }
            print!("{}", ops_cli::render_config(&config)?);
        }
    }
    Ok(())
}
