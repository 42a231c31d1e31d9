// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP callback notifier
//!
//! Sends notifications to the edge system with one JSON POST per notice.
//! Non-2xx answers and transport errors are logged and dropped.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::{AlarmNotice, CallbackCategory, Notifier, TaskNotice};
use crate::config::EdgeConfig;

/// Edge endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPaths {
    pub support: String,
    pub platform_height: String,
    pub platform_leveling: String,
    pub alarm: String,
}

impl Default for CallbackPaths {
    fn default() -> Self {
        Self {
            support: "/stability/support/cback".to_string(),
            platform_height: "/stability/platformHeight/cback".to_string(),
            platform_leveling: "/stability/platformHorizontal/cback".to_string(),
            alarm: "/stability/error/report".to_string(),
        }
    }
}

/// Notifier posting JSON to the edge system.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    base_url: String,
    paths: CallbackPaths,
    client: reqwest::Client,
    timeout_seconds: u64,
}

impl HttpNotifier {
    /// Create a notifier for the edge system at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Edge system root URL (http:// or https://)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            paths: CallbackPaths::default(),
            client: reqwest::Client::new(),
            timeout_seconds: 5,
        }
    }

    pub fn from_config(config: &EdgeConfig) -> Self {
        Self::new(config.base_url.clone())
            .with_timeout_seconds(config.timeout_seconds)
            .with_paths(CallbackPaths {
                support: config.support_path.clone(),
                platform_height: config.platform_height_path.clone(),
                platform_leveling: config.platform_leveling_path.clone(),
                alarm: config.alarm_path.clone(),
            })
    }

    /// Set HTTP request timeout
    ///
    /// # Arguments
    /// * `seconds` - Timeout in seconds (1-60)
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds.clamp(1, 60);
        self
    }

    pub fn with_paths(mut self, paths: CallbackPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Full URL of the endpoint for a task category.
    pub fn task_url(&self, category: CallbackCategory) -> String {
        let path = match category {
            CallbackCategory::Support => &self.paths.support,
            CallbackCategory::PlatformHeight => &self.paths.platform_height,
            CallbackCategory::PlatformLeveling => &self.paths.platform_leveling,
        };
        format!("{}{}", self.base_url, path)
    }

    pub fn alarm_url(&self) -> String {
        format!("{}{}", self.base_url, self.paths.alarm)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) {
        debug!("POST {}", url);
        let result = self
            .client
            .post(url)
            .timeout(Duration::from_secs(self.timeout_seconds))
            .json(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Callback to {} accepted ({})", url, response.status());
            }
            Ok(response) => {
                warn!(
                    "Callback to {} rejected with status {}",
                    url,
                    response.status()
                );
            }
            Err(e) => {
                error!("Callback to {} failed: {}", url, e);
            }
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify_task(&self, notice: &TaskNotice) {
        info!(
            "Reporting task {} ({}) to edge system: {}",
            notice.task_id, notice.category, notice.state
        );
        self.post(&self.task_url(notice.category), notice).await;
    }

    async fn notify_alarm(&self, notice: &AlarmNotice) {
        info!(
            "Reporting alarm '{}' ({}) to edge system",
            notice.alarm, notice.state
        );
        self.post(&self.alarm_url(), notice).await;
    }

    fn notifier_type(&self) -> &str {
        "http"
    }
}
