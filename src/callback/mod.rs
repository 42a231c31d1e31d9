// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Outbound notifications to the edge system
//!
//! Task outcomes and alarm transitions are delivered through the [`Notifier`]
//! trait. Delivery is best-effort: implementations log failures and never
//! retry or surface them, so a slow or broken edge endpoint cannot stall
//! command execution or alarm polling.
//!
//! ## Payloads
//!
//! Task completion (one endpoint per [`CallbackCategory`]):
//!
//! ```json
//! { "taskId": 1, "defectId": 9, "platformNum": 1, "state": "platform 1 raised" }
//! ```
//!
//! Alarm report:
//!
//! ```json
//! { "alarm": "oil temperature high", "state": "error", "timestamp": 1718000000000 }
//! ```

pub mod http;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmEvent, AlarmState};

pub use http::HttpNotifier;
pub use memory::MemoryNotifier;

/// Family of a task operation, selecting the callback endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackCategory {
    #[default]
    Support,
    PlatformHeight,
    PlatformLeveling,
}

impl fmt::Display for CallbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => f.write_str("support"),
            Self::PlatformHeight => f.write_str("platform-height"),
            Self::PlatformLeveling => f.write_str("platform-leveling"),
        }
    }
}

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNotice {
    #[serde(skip)]
    pub category: CallbackCategory,
    pub task_id: i64,
    pub defect_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform_num: Option<u8>,
    pub state: String,
}

impl TaskNotice {
    pub fn is_error(&self) -> bool {
        self.state.starts_with("error")
    }
}

/// Alarm transition as sent to the edge system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmNotice {
    pub alarm: String,
    pub state: AlarmState,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl AlarmNotice {
    pub fn from_event(event: &AlarmEvent) -> Self {
        Self {
            alarm: event.description.clone(),
            state: event.state,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Sink for task and alarm notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a task outcome. Never fails from the caller's point of view.
    async fn notify_task(&self, notice: &TaskNotice);

    /// Deliver an alarm transition. Never fails from the caller's point of view.
    async fn notify_alarm(&self, notice: &AlarmNotice);

    fn notifier_type(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_notice_body() {
        let notice = TaskNotice {
            category: CallbackCategory::PlatformHeight,
            task_id: 1,
            defect_id: 9,
            platform_num: Some(1),
            state: "platform 1 raised".into(),
        };
        assert_eq!(
            serde_json::to_value(&notice).unwrap(),
            json!({"taskId": 1, "defectId": 9, "platformNum": 1, "state": "platform 1 raised"})
        );

        let support = TaskNotice {
            category: CallbackCategory::Support,
            platform_num: None,
            state: "error: PLC connection lost: reset".into(),
            ..notice
        };
        let body = serde_json::to_value(&support).unwrap();
        assert!(body.get("platformNum").is_none());
        assert!(support.is_error());
    }

    #[test]
    fn test_alarm_notice_body() {
        let notice = AlarmNotice {
            alarm: "filter clogged".into(),
            state: AlarmState::Clear,
            timestamp: 1_700_000_000_000,
        };
        assert_eq!(
            serde_json::to_value(&notice).unwrap(),
            json!({"alarm": "filter clogged", "state": "clear", "timestamp": 1_700_000_000_000i64})
        );
    }
}
