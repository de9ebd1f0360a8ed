pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use procura_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Procura purchasing assistant CLI",
    long_about = "Inspect configuration, prepare the record store, search uploaded purchasing \
                  data and chat with the assistant.",
    after_help = "Examples:\n  procura doctor --json\n  procura seed --owner demo\n  \
                  procura search purchase-orders --owner demo --criteria '{\"supplierName\":\"Huolto\"}'\n  \
                  procura chat --owner demo"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a procura.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model key readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo purchase orders, invoices and price list for an owner")]
    Seed {
        #[arg(long, default_value = "demo")]
        owner: String,
    },
    #[command(about = "Run one search over an owner's records and print the JSON result")]
    Search {
        #[arg(help = "purchase-orders | invoices | price-list")]
        domain: String,
        #[arg(long, default_value = "demo")]
        owner: String,
        #[arg(long, default_value = "{}", help = "Search criteria as a JSON object")]
        criteria: String,
    },
    #[command(about = "Start a line-oriented conversation with the assistant")]
    Chat {
        #[arg(long, default_value = "demo")]
        owner: String,
        #[arg(long, help = "File with reference material appended to the system prime")]
        context_file: Option<PathBuf>,
    },
}

pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(options),
        },
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Migrate => commands::migrate::run(options),
        Command::Seed { owner } => commands::seed::run(options, &owner),
        Command::Search { domain, owner, criteria } => {
            commands::search::run(options, &domain, &owner, &criteria)
        }
        Command::Chat { owner, context_file } => {
            commands::chat::run(options, &owner, context_file.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
