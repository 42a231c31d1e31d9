// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Cooperative shutdown: a running flag plus a wake signal.
//!
//! Background loops check [`ShutdownSignal::is_running`] at iteration
//! boundaries and use [`ShutdownSignal::sleep`] / [`ShutdownSignal::wait`] for
//! their idle waits, so a shutdown request interrupts waiting but never an
//! in-flight controller request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request shutdown and wake every waiting loop.
    pub fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent trigger is not missed.
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration`. Returns `false` if shutdown was requested meanwhile.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = self.wait() => false,
        }
    }
}
