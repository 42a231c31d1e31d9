// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Single-writer task pipeline
//!
//! [`TaskPipeline`] is the cheap, cloneable submission handle; [`TaskWorker`]
//! owns the receiving end of the FIFO and executes one task at a time through
//! the [`ConnectionManager`]. Each task yields exactly one notification,
//! success or error, sent after the command call has returned.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::{resolve, Task, TaskError};
use crate::callback::Notifier;
use crate::plc::ConnectionManager;
use crate::utility::ShutdownSignal;

/// Submission side of the pipeline.
#[derive(Debug, Clone)]
pub struct TaskPipeline {
    sender: UnboundedSender<Task>,
}

impl TaskPipeline {
    /// Create a pipeline and the worker that drains it.
    pub fn new(plc: Arc<ConnectionManager>, notifier: Arc<dyn Notifier>) -> (Self, TaskWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self { sender },
            TaskWorker {
                receiver,
                plc,
                notifier,
            },
        )
    }

    /// Queue a task. Never waits for execution.
    pub fn submit(&self, task: Task) -> Result<(), TaskError> {
        debug!(
            "Queueing task {} ({} on {:?})",
            task.task_id, task.operation, task.target
        );
        self.sender
            .send(task)
            .map_err(|_| TaskError::PipelineClosed)
    }

    /// False once the worker has stopped.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Receiving side of the pipeline.
pub struct TaskWorker {
    receiver: UnboundedReceiver<Task>,
    plc: Arc<ConnectionManager>,
    notifier: Arc<dyn Notifier>,
}

impl TaskWorker {
    /// Execute one task and report its outcome.
    pub async fn execute(&self, task: Task) {
        let resolved = resolve(&task);
        if !resolved.is_recognized() {
            warn!(
                "Unrecognized operation '{}' for task {}, passing it to the PLC as is",
                task.operation, task.task_id
            );
        }

        info!(
            "Executing task {}: {} -> {}",
            task.task_id, task.operation, resolved.command
        );
        let notice = match self.plc.execute_command(&resolved.command).await {
            Ok(()) => {
                info!("Task {} done: {}", task.task_id, resolved.success_phrase());
                resolved.success_notice(&task)
            }
            Err(e) => {
                error!("Task {} failed: {}", task.task_id, e);
                resolved.error_notice(&task, &e)
            }
        };
        self.notifier.notify_task(&notice).await;
    }

    /// Drain the queue until shutdown or until every handle is dropped.
    pub async fn run(mut self, shutdown: ShutdownSignal) -> Result<()> {
        info!("Task worker started");
        while shutdown.is_running() {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                task = self.receiver.recv() => match task {
                    Some(task) => self.execute(task).await,
                    None => {
                        debug!("All task handles dropped");
                        break;
                    }
                },
            }
        }

        self.receiver.close();
        let mut dropped = 0;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Task worker stopped with {} queued task(s) not executed", dropped);
        }
        info!("Task worker stopped");
        Ok(())
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CallbackCategory, MemoryNotifier};
    use crate::plc::{command_bit, ConnectionSettings, LinkError, PlcMemory, SimulatedLink};
    use std::time::Duration;

    struct Bench {
        memory: PlcMemory,
        notifier: Arc<MemoryNotifier>,
        pipeline: TaskPipeline,
        plc: Arc<ConnectionManager>,
        shutdown: ShutdownSignal,
        worker: JoinHandle<Result<()>>,
    }

    fn bench() -> Bench {
        let memory = PlcMemory::new();
        let plc = Arc::new(ConnectionManager::new(
            Box::new(SimulatedLink::new(memory.clone())),
            ConnectionSettings::default(),
        ));
        let notifier = Arc::new(MemoryNotifier::new());
        let (pipeline, worker) = TaskPipeline::new(plc.clone(), notifier.clone());
        let shutdown = ShutdownSignal::new();
        let worker = worker.spawn(shutdown.clone());
        Bench {
            memory,
            notifier,
            pipeline,
            plc,
            shutdown,
            worker,
        }
    }

    async fn wait_for_notices(notifier: &MemoryNotifier, count: usize) {
        for _ in 0..1000 {
            if notifier.tasks().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} notices, got {}", count, notifier.tasks().len());
    }

    fn coil(name: &str) -> u16 {
        command_bit(name).unwrap().coil()
    }

    #[tokio::test(start_paused = true)]
    async fn test_raise_scenario_reports_once() {
        let bench = bench();
        bench
            .pipeline
            .submit(Task::new(1, 9, "raise").with_target("1"))
            .unwrap();
        wait_for_notices(&bench.notifier, 1).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let notices = bench.notifier.tasks();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].category, CallbackCategory::PlatformHeight);
        assert_eq!(notices[0].task_id, 1);
        assert_eq!(notices[0].defect_id, 9);
        assert_eq!(notices[0].platform_num, Some(1));
        assert_eq!(notices[0].state, "platform 1 raised");

        let raise = coil("platform1_raise");
        assert_eq!(
            bench.memory.coil_writes(),
            vec![(raise, true), (raise, false)]
        );

        bench.shutdown.trigger();
        bench.worker.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_in_submission_order() {
        let bench = bench();
        for (id, op) in [(1, "rigid"), (2, "down"), (3, "level")] {
            bench.pipeline.submit(Task::new(id, 0, op)).unwrap();
        }
        wait_for_notices(&bench.notifier, 3).await;

        let ids: Vec<_> = bench.notifier.tasks().iter().map(|n| n.task_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let pulses: Vec<_> = bench
            .memory
            .coil_writes()
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(addr, _)| addr)
            .collect();
        assert_eq!(
            pulses,
            vec![
                coil("support_rigid"),
                coil("platform1_lower"),
                coil("platform1_level")
            ]
        );

        bench.shutdown.trigger();
        bench.worker.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_does_not_block_the_next() {
        let bench = bench();
        bench.pipeline.submit(Task::new(1, 0, "flexible")).unwrap();
        bench.pipeline.submit(Task::new(2, 0, "explode")).unwrap();
        bench
            .pipeline
            .submit(Task::new(3, 0, "level_reset").with_target("2"))
            .unwrap();
        wait_for_notices(&bench.notifier, 3).await;

        let notices = bench.notifier.tasks();
        assert_eq!(notices.len(), 3);
        assert!(!notices[0].is_error());
        assert_eq!(notices[1].task_id, 2);
        assert_eq!(notices[1].category, CallbackCategory::Support);
        assert!(notices[1].is_error());
        assert!(notices[1].state.contains("explode"));
        assert_eq!(notices[2].state, "platform 2 leveling reset");
        assert_eq!(notices[2].category, CallbackCategory::PlatformLeveling);

        bench.shutdown.trigger();
        bench.worker.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_controller_yields_error_notice() {
        let bench = bench();
        bench.memory.set_online(false);
        bench
            .pipeline
            .submit(Task::new(4, 2, "up").with_target("2"))
            .unwrap();
        wait_for_notices(&bench.notifier, 1).await;

        let notices = bench.notifier.tasks();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_error());
        assert_eq!(notices[0].platform_num, Some(2));
        assert!(bench.memory.coil_writes().is_empty());

        bench.shutdown.trigger();
        bench.worker.await.unwrap().unwrap();
        assert!(!bench.pipeline.is_open());
        assert_eq!(
            bench.pipeline.submit(Task::new(5, 0, "rigid")),
            Err(TaskError::PipelineClosed)
        );
        bench.plc.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submitters_keep_their_own_order() {
        let bench = bench();
        let submitters: Vec<(i64, [(&'static str, &'static str); 2])> = vec![
            (10, [("rigid", "1"), ("flexible", "1")]),
            (20, [("up", "1"), ("down", "1")]),
            (30, [("level", "2"), ("level_reset", "2")]),
        ];

        let mut handles = Vec::new();
        for (base, operations) in submitters.clone() {
            let pipeline = bench.pipeline.clone();
            handles.push(tokio::spawn(async move {
                for (offset, (op, target)) in operations.into_iter().enumerate() {
                    pipeline
                        .submit(Task::new(base + offset as i64, 0, op).with_target(target))
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        wait_for_notices(&bench.notifier, 6).await;

        let ids: Vec<_> = bench.notifier.tasks().iter().map(|n| n.task_id).collect();
        let pulses: Vec<_> = bench
            .memory
            .coil_writes()
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(addr, _)| addr)
            .collect();
        assert_eq!(pulses.len(), 6);

        let expected_coils = [
            [coil("support_rigid"), coil("support_flexible")],
            [coil("platform1_raise"), coil("platform1_lower")],
            [coil("platform2_level"), coil("platform2_level_reset")],
        ];
        for ((base, _), coils) in submitters.iter().zip(expected_coils) {
            let own_ids: Vec<_> = ids.iter().copied().filter(|id| id / 10 == base / 10).collect();
            assert_eq!(own_ids, vec![*base, base + 1]);

            let own_pulses: Vec<_> = pulses.iter().copied().filter(|c| coils.contains(c)).collect();
            assert_eq!(own_pulses, coils.to_vec());
        }

        bench.shutdown.trigger();
        bench.worker.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_failure_on_one_task_reports_it_and_runs_the_next() {
        let bench = bench();
        bench.pipeline.submit(Task::new(1, 0, "rigid")).unwrap();
        wait_for_notices(&bench.notifier, 1).await;

        bench
            .memory
            .fail_next(LinkError::ConnectionLost("broken pipe".into()));
        bench
            .pipeline
            .submit(Task::new(2, 0, "up").with_target("1"))
            .unwrap();
        bench
            .pipeline
            .submit(Task::new(3, 0, "down").with_target("2"))
            .unwrap();
        wait_for_notices(&bench.notifier, 3).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let notices = bench.notifier.tasks();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices.iter().filter(|n| n.task_id == 2).count(), 1);
        assert_eq!(notices[1].task_id, 2);
        assert!(notices[1].is_error());
        assert_eq!(notices[1].category, CallbackCategory::PlatformHeight);
        assert_eq!(notices[2].task_id, 3);
        assert_eq!(notices[2].state, "platform 2 lowered");

        // The failed write never reached the coil
        assert!(!bench.memory.coil(coil("platform1_raise")));
        assert!(bench
            .memory
            .coil_writes()
            .contains(&(coil("platform2_lower"), true)));

        bench.shutdown.trigger();
        bench.worker.await.unwrap().unwrap();
    }
}
