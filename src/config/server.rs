// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Web server configuration

use serde::{Deserialize, Serialize};

/// Settings of the inbound HTTP API.
///
/// The server receives control requests from the edge system and exposes the
/// live device state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Start the HTTP API. When disabled only the background loops run.
    pub enabled: bool,

    /// Network address the server binds to. Use "0.0.0.0" for all IPv4 interfaces.
    pub address: String,

    /// TCP port of the server (1-65534).
    pub port: u16,

    /// Name reported in the `Server` header.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "0.0.0.0".to_string(),
            port: 8080,
            name: format!("StabilityGateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
