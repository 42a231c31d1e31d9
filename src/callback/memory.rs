// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory notifier, used when no edge system is reachable and in tests.

use std::sync::Mutex;

use async_trait::async_trait;
use log::info;

use super::{AlarmNotice, Notifier, TaskNotice};

/// Notifier that logs and keeps every notice.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    tasks: Mutex<Vec<TaskNotice>>,
    alarms: Mutex<Vec<AlarmNotice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<TaskNotice> {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn alarms(&self) -> Vec<AlarmNotice> {
        self.alarms.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify_task(&self, notice: &TaskNotice) {
        info!(
            "Task {} ({}) finished: {}",
            notice.task_id, notice.category, notice.state
        );
        self.tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notice.clone());
    }

    async fn notify_alarm(&self, notice: &AlarmNotice) {
        info!("Alarm '{}': {}", notice.alarm, notice.state);
        self.alarms
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notice.clone());
    }

    fn notifier_type(&self) -> &str {
        "memory"
    }
}
