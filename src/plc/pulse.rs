// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Deferred pulse resets.
//!
//! A command bit is a momentary push-button: it is written to 1 and, after a
//! fixed delay, back to 0. Each pulse gets a [`PulseTicket`] carrying a
//! per-coil generation. Pulsing the same coil again issues a newer ticket, and
//! a reset whose ticket is no longer current does nothing, so each coil is
//! reset once after its latest pulse. Superseded resets are never aborted: a
//! reset already talking to the controller always runs to completion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error};
use tokio::task::JoinHandle;

type Generations = Arc<Mutex<HashMap<u16, u64>>>;

/// Identity of one pulse of one coil.
#[derive(Debug, Clone)]
pub struct PulseTicket {
    coil: u16,
    generation: u64,
    generations: Generations,
}

impl PulseTicket {
    pub fn coil(&self) -> u16 {
        self.coil
    }

    /// `false` once the coil was pulsed again or resets were cancelled.
    pub fn is_current(&self) -> bool {
        let generations = self.generations.lock().unwrap_or_else(|p| p.into_inner());
        generations.get(&self.coil) == Some(&self.generation)
    }
}

#[derive(Debug, Default)]
pub struct PulseScheduler {
    pending: Mutex<HashMap<u16, JoinHandle<()>>>,
    generations: Generations,
    next_generation: AtomicU64,
}

impl PulseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the ticket of a new pulse on `coil`, superseding older ones.
    ///
    /// Call it while still holding the link that wrote the bit, so that a
    /// superseded reset checking its ticket under the same lock sees it.
    pub fn issue(&self, coil: u16) -> PulseTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.generations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(coil, generation);
        PulseTicket {
            coil,
            generation,
            generations: Arc::clone(&self.generations),
        }
    }

    /// Run `reset` after `delay` unless `ticket` has been superseded by then.
    pub fn schedule<F, Fut>(&self, ticket: PulseTicket, delay: Duration, reset: F)
    where
        F: FnOnce(PulseTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let coil = ticket.coil;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !ticket.is_current() {
                debug!("Reset of coil {} superseded by a newer pulse", ticket.coil);
                return;
            }
            reset(ticket).await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.retain(|_, h| !h.is_finished());
        if pending.insert(coil, handle).is_some() {
            debug!("Replacing pending reset of coil {}", coil);
        }
    }

    /// Number of resets not yet executed.
    pub fn pending(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.values().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every pending reset to run.
    pub async fn flush(&self) {
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Pulse reset task panicked: {}", e);
                }
            }
        }
    }

    /// Invalidate every pending reset. Resets already writing finish normally.
    pub fn cancel_all(&self) {
        self.generations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        for (coil, handle) in pending.drain() {
            if !handle.is_finished() {
                debug!("Cancelling pending reset of coil {}", coil);
            }
        }
    }
}

impl Drop for PulseScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_reset_runs_once_after_delay() {
        let scheduler = PulseScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let ticket = scheduler.issue(177);
        scheduler.schedule(ticket, Duration::from_secs(1), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        scheduler.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repulse_replaces_pending_reset() {
        let scheduler = PulseScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = runs.clone();
            let ticket = scheduler.issue(180);
            scheduler.schedule(ticket, Duration::from_secs(1), move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        scheduler.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let scheduler = PulseScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let ticket = scheduler.issue(181);
        scheduler.schedule(ticket, Duration::from_secs(1), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel_all();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repulse_lets_a_running_reset_finish() {
        let scheduler = PulseScheduler::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = finished.clone();
        let ticket = scheduler.issue(182);
        scheduler.schedule(ticket, Duration::from_secs(1), move |_| async move {
            // Stands for a slow write to the controller
            tokio::time::sleep(Duration::from_millis(500)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1200)).await;
        let counter = finished.clone();
        let ticket = scheduler.issue(182);
        scheduler.schedule(ticket, Duration::from_secs(1), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        scheduler.flush().await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let scheduler = PulseScheduler::new();
        let first = scheduler.issue(183);
        let other_coil = scheduler.issue(184);
        assert!(first.is_current());

        let second = scheduler.issue(183);
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(other_coil.is_current());

        scheduler.cancel_all();
        assert!(!second.is_current());
        assert!(!other_coil.is_current());
    }
}
