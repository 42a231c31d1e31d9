// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Edge system callback configuration

use serde::{Deserialize, Serialize};

/// Where and how task and alarm notifications are delivered.
///
/// Paths are appended to `base_url`. When `enabled` is false the gateway keeps
/// notices in memory and only logs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub enabled: bool,
    /// Root URL of the edge system, `http://` or `https://`.
    pub base_url: String,
    /// Per-request timeout in seconds (clamped to 1-60).
    pub timeout_seconds: u64,
    pub support_path: String,
    pub platform_height_path: String,
    pub platform_leveling_path: String,
    pub alarm_path: String,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:9090".to_string(),
            timeout_seconds: 5,
            support_path: "/stability/support/cback".to_string(),
            platform_height_path: "/stability/platformHeight/cback".to_string(),
            platform_leveling_path: "/stability/platformHorizontal/cback".to_string(),
            alarm_path: "/stability/error/report".to_string(),
        }
    }
}
