// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Alarm monitor configuration

use serde::{Deserialize, Serialize};

/// Timings of the alarm polling loop.
///
/// # Fields
///
/// * `enabled` - Start the alarm monitor with the daemon
/// * `poll_interval_ms` - Time between two polls of the alarm bytes (default: 5000)
/// * `startup_delay_ms` - Wait before the first poll (default: 500)
/// * `rereport_interval_secs` - Minimum time between two reports of the same
///   unresolved alarm (default: 60)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub startup_delay_ms: u64,
    pub rereport_interval_secs: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 5000,
            startup_delay_ms: 500,
            rereport_interval_secs: 60,
        }
    }
}
