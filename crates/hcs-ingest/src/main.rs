//! hcs-ingest - main entry point

use clap::Parser;
use hcs_common::logging::{init_logging, LogConfig, LogLevel};
use hcs_ingest::config::DbSettings;
use hcs_ingest::coordinator::IngestTarget;
use hcs_ingest::{commands, Cli, Commands};
use std::process;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(level)
        .log_file_prefix("hcs-ingest")
        .build();

    // Environment variables take precedence over the flag
    let log_config = match log_config.clone().with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {:#}", e);
            log_config
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            process::exit(1);
        },
    };

    if let Err(e) = dotenv {
        warn!(error = %e, "No .env file loaded, using environment variables");
    }

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Ingest { file, dir, workers } => {
            let target = IngestTarget::from_args(file.clone(), dir.clone())?;
            let settings = DbSettings::from_env()?;
            commands::ingest(&settings, &target, *workers).await?;
        },

        Commands::CheckConnection => {
            let settings = DbSettings::from_env()?;
            let info = commands::check_connection(&settings).await?;
            println!("Connected to {}", info.current_database);
            println!("{}", info.version);
        },

        Commands::CreateDatabase => {
            let settings = DbSettings::from_env()?;
            if commands::create_database(&settings).await? {
                println!("Created database {}", settings.database);
            } else {
                println!("Database {} already exists", settings.database);
            }
        },
    }

    Ok(())
}
