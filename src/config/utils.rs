// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::debug;

use super::Config;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./stability_gateway --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

fn check_port(name: &str, port: u16) -> Result<()> {
    if !(1..=65534).contains(&port) {
        anyhow::bail!("Invalid {} port number: {}", name, port);
    }
    Ok(())
}

/// Validates the configuration against rules the JSON schema does not express.
///
/// # Validation Rules
///
/// - **Port Range**: PLC and server ports are within 1-65534
/// - **Edge URL**: `edge.base_url` uses the `http://` or `https://` scheme
/// - **Poll Interval**: the alarm poll interval is not zero
/// - **Addresses**: a server address that is not an IP address only logs a debug message
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    check_port("PLC", config.plc.port)?;
    check_port("server", config.server.port)?;

    if config.plc.address.trim().is_empty() {
        anyhow::bail!("PLC address must not be empty");
    }

    let url = config.edge.base_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("Edge base URL must start with http:// or https://: {}", url);
    }

    if config.alarm.poll_interval_ms == 0 {
        anyhow::bail!("Alarm poll interval must be greater than zero");
    }

    if config.plc.backoff_multiplier < 1.0 {
        anyhow::bail!(
            "PLC backoff multiplier must be at least 1.0, got {}",
            config.plc.backoff_multiplier
        );
    }

    if !is_valid_ip_address(&config.server.address) {
        debug!(
            "Potentially invalid server address format: {}",
            config.server.address
        );
    }

    Ok(())
}
