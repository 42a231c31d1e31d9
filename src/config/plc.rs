// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC link configuration
//!
//! This module defines the settings used to reach the stability controller
//! over Modbus TCP, and the timings of the connection manager.

use serde::{Deserialize, Serialize};

/// Configuration for the controller link.
///
/// # Fields
///
/// * `address` - Host name or IP address of the controller (default: 192.168.1.10)
/// * `port` - Modbus TCP port of the controller (default: 502)
/// * `unit_id` - Modbus unit identifier (default: 1)
/// * `simulated` - Use the in-process simulated controller instead of the network
///
/// # Example
///
/// ```
/// use stability_gateway::config::PlcConfig;
///
/// let plc = PlcConfig {
///     address: "10.0.0.5".to_string(),
///     simulated: true,
///     ..PlcConfig::default()
/// };
/// assert_eq!(plc.port, 502);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    /// Controller host name or IP address.
    pub address: String,

    /// Controller Modbus TCP port.
    ///
    /// Valid range is 1-65534. Default value is 502, the standard Modbus TCP port.
    pub port: u16,

    /// Modbus unit identifier of the controller.
    pub unit_id: u8,

    /// Upper bound for a single register request, in milliseconds.
    ///
    /// A request exceeding it is treated as a lost connection.
    pub response_timeout_ms: u64,

    /// Number of retries after a failed connect attempt.
    pub connect_retries: u32,

    /// Wait before the first connect retry, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Growth factor applied to the wait between consecutive retries.
    pub backoff_multiplier: f64,

    /// Pause after a fresh session before the first request, in milliseconds.
    pub settle_delay_ms: u64,

    /// Time a command bit stays high before being reset, in milliseconds.
    pub pulse_duration_ms: u64,

    /// Run against the in-process simulated controller.
    pub simulated: bool,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.10".to_string(),
            port: 502,
            unit_id: 1,
            response_timeout_ms: 1000,
            connect_retries: 3,
            initial_backoff_ms: 1000,
            backoff_multiplier: 1.5,
            settle_delay_ms: 500,
            pulse_duration_ms: 1000,
            simulated: false,
        }
    }
}
