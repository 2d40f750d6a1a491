use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ntag424_apdu_transport_pcsc::{PcscDeviceManager, PcscReaderSession};
use tracing::debug;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod commands;
mod config;
mod utils;

use commands::*;
use config::{Config, load_config};

#[derive(Parser)]
#[command(version, about = "Personalize NTAG 424 DNA tags for Secure Dynamic Messaging")]
struct Cli {
    /// Reader name to use (uses the first reader holding a card if not specified)
    #[arg(short, long, env = "CL_READER")]
    reader: Option<String>,

    /// Master key the application keys are diversified from, in hex
    #[arg(long, env = "MASTER_KEY_HEX", hide_env_values = true)]
    master_key: Option<String>,

    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Show reader and configuration status
    Status,

    /// Read the UID of the presented tag
    Uid,

    /// Read and decode the NDEF file settings
    Settings,

    /// Read and decode the NDEF message
    Ndef,

    /// Write the URL template, diversify the keys and lock the file settings
    Personalize {
        /// Full URL template with {uid}, {counter} and {cmac} placeholders
        #[arg(long, conflicts_with = "base_url")]
        url: Option<String>,

        /// Base URL the default verification path is appended to
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn main() -> eyre::Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?.with_overrides(Config {
        reader: cli.reader,
        master_key_hex: cli.master_key,
        base_url: None,
    });
    debug!(?config, "Loaded configuration");

    let manager = PcscDeviceManager::new();

    match cli.command {
        Commands::List => {
            list_command(&manager?)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Status => {
            status_command(manager, &config)?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let session = PcscReaderSession::new(manager?, config.reader.as_deref());
    match cli.command {
        Commands::List | Commands::Status => unreachable!(), // Already handled above
        Commands::Uid => uid_command(&session)?,
        Commands::Settings => settings_command(&session)?,
        Commands::Ndef => ndef_command(&session)?,
        Commands::Personalize { url, base_url } => {
            let template = config.template(url, base_url);
            return personalize_command(&session, &config, &template);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();
}
