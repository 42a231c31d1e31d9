// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command tasks
//!
//! A [`Task`] is one request from the edge system, expressed in its own
//! vocabulary (`rigid`, `up`, `level`, ...). [`resolve`] translates it into the
//! controller command name to pulse, the callback category used to report the
//! outcome, and the phrase reported on success.
//!
//! | operation | command | category |
//! |---|---|---|
//! | `rigid` | `support_rigid` | support |
//! | `flexible` | `support_flexible` | support |
//! | `up` / `raise` | `platform{N}_raise` | platform height |
//! | `down` / `lower` | `platform{N}_lower` | platform height |
//! | `level` | `platform{N}_level` | platform leveling |
//! | `level_reset` | `platform{N}_level_reset` | platform leveling |
//!
//! `N` is the task target and defaults to `1`. Any other operation is passed
//! through verbatim as the command name and reported in the support category.

pub mod pipeline;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::callback::{CallbackCategory, TaskNotice};

pub use pipeline::{TaskPipeline, TaskWorker};

/// Platform used when a platform operation carries no target.
pub const DEFAULT_TARGET: &str = "1";

/// One request to perform a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: i64,
    pub defect_id: i64,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Task {
    pub fn new(task_id: i64, defect_id: i64, operation: impl Into<String>) -> Self {
        Self {
            task_id,
            defect_id,
            operation: operation.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task pipeline is not running")]
    PipelineClosed,
}

/// What a task turns into at the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub command: String,
    pub category: CallbackCategory,
    pub platform_num: Option<u8>,
    success_phrase: String,
    recognized: bool,
}

impl ResolvedTask {
    pub fn success_phrase(&self) -> &str {
        &self.success_phrase
    }

    /// False for operations outside the lookup table.
    pub fn is_recognized(&self) -> bool {
        self.recognized
    }

    /// Notice reporting a successful execution.
    pub fn success_notice(&self, task: &Task) -> TaskNotice {
        self.notice(task, self.success_phrase.clone())
    }

    /// Notice reporting a failure with `detail`.
    pub fn error_notice(&self, task: &Task, detail: impl std::fmt::Display) -> TaskNotice {
        self.notice(task, format!("error: {}", detail))
    }

    fn notice(&self, task: &Task, state: String) -> TaskNotice {
        TaskNotice {
            category: self.category,
            task_id: task.task_id,
            defect_id: task.defect_id,
            platform_num: self.platform_num,
            state,
        }
    }
}

/// Map a task to its command, callback category and success phrase.
pub fn resolve(task: &Task) -> ResolvedTask {
    let target = task
        .target
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TARGET);

    let support = |command: &str, phrase: &str| ResolvedTask {
        command: command.to_string(),
        category: CallbackCategory::Support,
        platform_num: None,
        success_phrase: phrase.to_string(),
        recognized: true,
    };
    let platform = |category, action: &str, phrase: &str| ResolvedTask {
        command: format!("platform{}_{}", target, action),
        category,
        platform_num: target.parse().ok(),
        success_phrase: format!("platform {} {}", target, phrase),
        recognized: true,
    };

    match task.operation.as_str() {
        "rigid" => support("support_rigid", "rigid support engaged"),
        "flexible" => support("support_flexible", "flexible support reset"),
        "up" | "raise" => platform(CallbackCategory::PlatformHeight, "raise", "raised"),
        "down" | "lower" => platform(CallbackCategory::PlatformHeight, "lower", "lowered"),
        "level" => platform(CallbackCategory::PlatformLeveling, "level", "leveled"),
        "level_reset" => platform(
            CallbackCategory::PlatformLeveling,
            "level_reset",
            "leveling reset",
        ),
        other => ResolvedTask {
            command: other.to_string(),
            category: CallbackCategory::Support,
            platform_num: None,
            success_phrase: format!("{} executed", other),
            recognized: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plc::command_bit;

    #[test]
    fn test_every_known_operation_maps_to_a_command_bit() {
        for (operation, target) in [
            ("rigid", None),
            ("flexible", None),
            ("up", Some("1")),
            ("down", Some("2")),
            ("raise", Some("2")),
            ("lower", Some("1")),
            ("level", Some("1")),
            ("level_reset", Some("2")),
        ] {
            let mut task = Task::new(1, 1, operation);
            task.target = target.map(String::from);
            let resolved = resolve(&task);
            assert!(resolved.is_recognized());
            assert!(
                command_bit(&resolved.command).is_some(),
                "{} has no command bit",
                resolved.command
            );
        }
    }

    #[test]
    fn test_platform_target_defaults_to_one() {
        let resolved = resolve(&Task::new(1, 9, "up"));
        assert_eq!(resolved.command, "platform1_raise");
        assert_eq!(resolved.platform_num, Some(1));
        assert_eq!(resolved.category, CallbackCategory::PlatformHeight);
        assert_eq!(resolved.success_phrase(), "platform 1 raised");
    }

    #[test]
    fn test_leveling_category_and_phrase() {
        let resolved = resolve(&Task::new(3, 4, "level_reset").with_target("2"));
        assert_eq!(resolved.command, "platform2_level_reset");
        assert_eq!(resolved.category, CallbackCategory::PlatformLeveling);
        assert_eq!(resolved.success_phrase(), "platform 2 leveling reset");
    }

    #[test]
    fn test_support_notice_has_no_platform() {
        let task = Task::new(5, 6, "rigid").with_target("2");
        let resolved = resolve(&task);
        let notice = resolved.success_notice(&task);
        assert_eq!(notice.category, CallbackCategory::Support);
        assert_eq!(notice.platform_num, None);
        assert_eq!(notice.state, "rigid support engaged");
    }

    #[test]
    fn test_unknown_operation_is_passed_through() {
        let task = Task::new(7, 8, "power_on");
        let resolved = resolve(&task);
        assert!(!resolved.is_recognized());
        assert_eq!(resolved.command, "power_on");
        let notice = resolved.error_notice(&task, "unknown command");
        assert_eq!(notice.state, "error: unknown command");
        assert!(notice.is_error());
    }

    #[test]
    fn test_task_json_shape() {
        let task: Task = serde_json::from_str(
            r#"{"taskId": 1, "defectId": 9, "operation": "up", "target": "1"}"#,
        )
        .unwrap();
        assert_eq!(task, Task::new(1, 9, "up").with_target("1"));
    }
}
