// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use stability_gateway::modbus::modbus_server::{serve_service, PlcSimulatorService};
use stability_gateway::plc::PlcMemory;
use stability_gateway::registers::address;

/// Modbus TCP simulator of the stability controller, for bench testing the gateway
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to listen on
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Port to listen on
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Initial oil temperature alarm code (1 high, 2 low, 4 normal)
    #[clap(long, default_value = "4")]
    oil_temperature_alarm: u8,

    /// Initial liquid level alarm code (1 high, 2 low, 4 normal)
    #[clap(long, default_value = "4")]
    liquid_level_alarm: u8,

    /// Initial filter alarm code (1 clogged, 2 normal)
    #[clap(long, default_value = "2")]
    filter_alarm: u8,

    /// Do not move the simulated machine when a command bit is pulsed
    #[clap(long)]
    no_command_effects: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let memory = PlcMemory::new();
    memory.set_byte(address::OIL_TEMPERATURE_ALARM, args.oil_temperature_alarm);
    memory.set_byte(address::LIQUID_LEVEL_ALARM, args.liquid_level_alarm);
    memory.set_byte(address::FILTER_ALARM, args.filter_alarm);

    let mut service = PlcSimulatorService::new(memory);
    if args.no_command_effects {
        service = service.without_command_effects();
    }

    let socket_addr = format!("{}:{}", args.address, args.port);
    let listener = TcpListener::bind(&socket_addr)
        .await
        .with_context(|| format!("Failed to bind PLC simulator to {}", socket_addr))?;

    tokio::select! {
        result = serve_service(listener, service) => result?,
        _ = tokio::signal::ctrl_c() => info!("Ctrl+C received, stopping PLC simulator"),
    }
    Ok(())
}
