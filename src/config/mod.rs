// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the stability gateway
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before it is deserialized.
//!
//! ## Configuration Structure
//!
//! - `plc`: how to reach the stability controller, and connection timings
//! - `server`: the inbound HTTP API
//! - `edge`: the edge system receiving task and alarm callbacks
//! - `alarm`: the alarm polling loop
//! - `logging`: default log level
//!
//! ## Usage
//!
//! ```no_run
//! use stability_gateway::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("10.0.0.5".to_string()),          // PLC address
//!     None,                                  // PLC port
//!     Some("0.0.0.0".to_string()),           // Web address
//!     Some(8081),                            // Web port
//!     Some("http://edge:9090".to_string()),  // Edge URL
//!     false,                                 // Simulated PLC
//! );
//!
//! println!("PLC endpoint: {}:{}", config.plc.address, config.plc.port);
//! ```

pub mod alarm;
pub mod edge;
pub mod logging;
pub mod plc;
pub mod server;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use alarm::AlarmConfig;
pub use edge::EdgeConfig;
pub use logging::LoggingConfig;
pub use plc::PlcConfig;
pub use server::ServerConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure of the gateway.
///
/// Every section falls back to its defaults when absent from the file, so a
/// minimal configuration only names what differs from the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Controller link settings.
    #[serde(default)]
    pub plc: PlcConfig,

    /// Inbound HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Edge system callback settings.
    #[serde(default)]
    pub edge: EdgeConfig,

    /// Alarm polling settings.
    #[serde(default)]
    pub alarm: AlarmConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Write a `<name>.sample.yaml` with default values next to `path`.
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample_path = path.as_ref().with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file failing schema
    /// validation, deserialization, or the extra rule checks is rejected and a
    /// sample file is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only the values actually provided override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `plc_address` - Controller host name or IP address
    /// * `plc_port` - Controller Modbus TCP port
    /// * `web_address` - Network address for the HTTP API to bind to
    /// * `web_port` - TCP port for the HTTP API
    /// * `edge_url` - Base URL of the edge system
    /// * `simulate` - If true, forces the in-process simulated controller
    pub fn apply_args(
        &mut self,
        plc_address: Option<String>,
        plc_port: Option<u16>,
        web_address: Option<String>,
        web_port: Option<u16>,
        edge_url: Option<String>,
        simulate: bool,
    ) {
        if let Some(address) = plc_address {
            debug!("Overriding PLC address from command line: {}", address);
            self.plc.address = address;
        }
        if let Some(port) = plc_port {
            debug!("Overriding PLC port from command line: {}", port);
            self.plc.port = port;
        }
        if let Some(address) = web_address {
            debug!("Overriding web address from command line: {}", address);
            self.server.address = address;
        }
        if let Some(port) = web_port {
            debug!("Overriding web port from command line: {}", port);
            self.server.port = port;
        }
        if let Some(url) = edge_url {
            debug!("Overriding edge URL from command line: {}", url);
            self.edge.base_url = url;
        }
        if simulate {
            debug!("Simulated PLC requested from command line");
            self.plc.simulated = true;
        }
    }
}
