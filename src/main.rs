// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the stability platform gateway

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::signal;

use stability_gateway::config::{self, Config};
use stability_gateway::daemon::Daemon;

/// Gateway between the stability platform PLC and the edge system
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (created with defaults when missing)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate a configuration file and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,

    /// PLC host name or IP address
    #[arg(long)]
    plc_address: Option<String>,

    /// PLC Modbus TCP port
    #[arg(long)]
    plc_port: Option<u16>,

    /// Web server address
    #[arg(short, long)]
    web_address: Option<String>,

    /// Web server port
    #[arg(short = 'p', long)]
    web_port: Option<u16>,

    /// Edge system base URL
    #[arg(long)]
    edge_url: Option<String>,

    /// Run against the in-process simulated PLC
    #[arg(long)]
    simulate: bool,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[rocket::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        config.logging.level_filter()
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    config.apply_args(
        args.plc_address.clone(),
        args.plc_port,
        args.web_address.clone(),
        args.web_port,
        args.edge_url.clone(),
        args.simulate,
    );

    info!(
        "Stability gateway {} starting with {}",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");

    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
