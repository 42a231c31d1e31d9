// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Background alarm polling loop.
//!
//! Each tick reads the three sensor alarm bytes through the connection manager
//! and feeds them to the [`AlarmLedger`]. A failed read, or the 255 sentinel on
//! any byte, switches the tick to the connection path:
//!
//! 1. reconnect right away (not at the next tick)
//! 2. if that fails, report the connection alarm, bypassing the debounce
//! 3. if it succeeds, verify with one more read, then send a clear for the
//!    connection alarm and evaluate the sensors
//!
//! A read that fails with [`PlcError::ConnectFailed`] has already been through
//! a whole connect cycle, so the connection alarm is reported without a second
//! one.
//!
//! Notifications are sent after the connection lock has been released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ledger::{AlarmEvent, AlarmLedger};
use super::{AlarmReading, AlarmSource};
use crate::callback::{AlarmNotice, Notifier};
use crate::config::AlarmConfig;
use crate::plc::{ConnectionManager, PlcError};
use crate::utility::ShutdownSignal;

/// Alarm polling loop state.
pub struct AlarmMonitor {
    plc: Arc<ConnectionManager>,
    notifier: Arc<dyn Notifier>,
    ledger: AlarmLedger,
    poll_interval: Duration,
    startup_delay: Duration,
}

impl AlarmMonitor {
    pub fn new(
        plc: Arc<ConnectionManager>,
        notifier: Arc<dyn Notifier>,
        config: &AlarmConfig,
    ) -> Self {
        Self {
            plc,
            notifier,
            ledger: AlarmLedger::new(Duration::from_secs(config.rereport_interval_secs)),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            startup_delay: Duration::from_millis(config.startup_delay_ms),
        }
    }

    pub fn ledger(&self) -> &AlarmLedger {
        &self.ledger
    }

    /// Run one poll iteration and report the resulting transitions.
    pub async fn poll_once(&mut self) {
        let events = match self.plc.read_alarms().await {
            Ok(reading) if !reading.has_sentinel() => self.evaluate(reading, Instant::now()),
            Ok(reading) => {
                warn!("Alarm bytes carry the connection-loss sentinel: {:?}", reading);
                self.recover_connection().await
            }
            // The read already went through a full connect cycle
            Err(e @ PlcError::ConnectFailed { .. }) => {
                error!("Alarm poll could not reach the PLC: {}", e);
                vec![self.ledger.force_connection_lost(Instant::now())]
            }
            Err(e) => {
                warn!("Alarm poll failed: {}", e);
                self.recover_connection().await
            }
        };
        self.report(events).await;
    }

    /// Healthy reading: the link is fine and sensors go through the debounce.
    fn evaluate(&mut self, reading: AlarmReading, now: Instant) -> Vec<AlarmEvent> {
        let mut events = self.ledger.clear_source(AlarmSource::Connection);
        for (source, value) in reading.values() {
            events.extend(self.ledger.observe(source, value, now));
        }
        events
    }

    async fn recover_connection(&mut self) -> Vec<AlarmEvent> {
        if let Err(e) = self.plc.reconnect().await {
            error!("PLC reconnect from alarm monitor failed: {}", e);
            return vec![self.ledger.force_connection_lost(Instant::now())];
        }

        match self.plc.read_alarms().await {
            Ok(reading) if !reading.has_sentinel() => {
                info!("PLC link recovered, alarm bytes readable again");
                let mut events = vec![self.ledger.force_connection_restored()];
                events.extend(self.evaluate(reading, Instant::now()));
                events
            }
            Ok(_) => {
                error!("PLC reconnected but alarm bytes still report connection loss");
                vec![self.ledger.force_connection_lost(Instant::now())]
            }
            Err(e) => {
                error!("Verification read after reconnect failed: {}", e);
                vec![self.ledger.force_connection_lost(Instant::now())]
            }
        }
    }

    async fn report(&self, events: Vec<AlarmEvent>) {
        for event in events {
            info!(
                "Alarm {} on {} (value {}): {}",
                event.state, event.source, event.value, event.description
            );
            self.notifier
                .notify_alarm(&AlarmNotice::from_event(&event))
                .await;
        }
    }

    /// Poll until `shutdown` is triggered.
    pub async fn run(mut self, shutdown: ShutdownSignal) -> Result<()> {
        info!(
            "Alarm monitor started (interval {:?}, startup delay {:?})",
            self.poll_interval, self.startup_delay
        );
        if !shutdown.sleep(self.startup_delay).await {
            return Ok(());
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while shutdown.is_running() {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Alarm poll tick");
                    self.poll_once().await;
                }
                _ = shutdown.wait() => break,
            }
        }
        info!("Alarm monitor stopped");
        Ok(())
    }

    /// Spawn the polling loop on the runtime.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmState, CONNECTION_LOST_SENTINEL};
    use crate::callback::MemoryNotifier;
    use crate::plc::link::MockRegisterLink;
    use crate::plc::{ConnectionSettings, LinkError, LinkOp, PlcMemory, SimulatedLink};
    use crate::registers::address;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor_over(memory: &PlcMemory) -> (AlarmMonitor, Arc<MemoryNotifier>) {
        let plc = Arc::new(ConnectionManager::new(
            Box::new(SimulatedLink::new(memory.clone())),
            ConnectionSettings::default(),
        ));
        let notifier = Arc::new(MemoryNotifier::new());
        let monitor = AlarmMonitor::new(plc, notifier.clone(), &AlarmConfig::default());
        (monitor, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_machine_reports_nothing() {
        let memory = PlcMemory::new();
        let (mut monitor, notifier) = monitor_over(&memory);
        monitor.poll_once().await;
        monitor.poll_once().await;
        assert!(notifier.alarms().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_reported_once_then_cleared() {
        let memory = PlcMemory::new();
        memory.set_byte(address::OIL_TEMPERATURE_ALARM, 1);
        let (mut monitor, notifier) = monitor_over(&memory);

        monitor.poll_once().await;
        monitor.poll_once().await;
        monitor.poll_once().await;
        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].alarm, "oil temperature high");
        assert_eq!(alarms[0].state, AlarmState::Error);

        memory.set_byte(address::OIL_TEMPERATURE_ALARM, 4);
        monitor.poll_once().await;
        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[1].alarm, "oil temperature high");
        assert_eq!(alarms[1].state, AlarmState::Clear);
        assert!(!monitor.ledger().is_active(AlarmSource::OilTemperature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_reconnects_within_the_same_tick() {
        let memory = PlcMemory::new();
        let (mut monitor, notifier) = monitor_over(&memory);
        monitor.poll_once().await;
        memory.clear_journal();

        for addr in [
            address::OIL_TEMPERATURE_ALARM,
            address::LIQUID_LEVEL_ALARM,
            address::FILTER_ALARM,
        ] {
            memory.set_byte(addr, CONNECTION_LOST_SENTINEL);
        }
        monitor.poll_once().await;

        assert!(memory.journal().contains(&LinkOp::Open));
        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].alarm, "PLC connection lost");
        assert_eq!(alarms[0].state, AlarmState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_alarm_is_never_debounced_and_clears_on_recovery() {
        let memory = PlcMemory::new();
        let (mut monitor, notifier) = monitor_over(&memory);
        monitor.poll_once().await;

        memory.set_online(false);
        monitor.poll_once().await;
        monitor.poll_once().await;
        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 2);
        assert!(alarms.iter().all(|a| a.state == AlarmState::Error));
        assert!(monitor.ledger().is_active(AlarmSource::Connection));

        memory.set_online(true);
        monitor.poll_once().await;
        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 3);
        assert_eq!(alarms[2].state, AlarmState::Clear);
        assert!(!monitor.ledger().is_active(AlarmSource::Connection));

        // A healthy read with no active connection alarm produces no clear
        monitor.poll_once().await;
        assert_eq!(notifier.alarms().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let memory = PlcMemory::new();
        let (monitor, _notifier) = monitor_over(&memory);
        let shutdown = ShutdownSignal::new();
        let handle = monitor.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert!(memory
            .journal()
            .iter()
            .any(|op| matches!(op, LinkOp::ReadByte(a) if *a == address::OIL_TEMPERATURE_ALARM)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_tick_runs_a_single_connect_cycle() {
        let memory = PlcMemory::new();
        memory.set_online(false);
        let (mut monitor, notifier) = monitor_over(&memory);

        let started = tokio::time::Instant::now();
        monitor.poll_once().await;

        let opens = memory
            .journal()
            .iter()
            .filter(|op| **op == LinkOp::Open)
            .count();
        assert_eq!(opens, 4);
        assert!(started.elapsed() < Duration::from_millis(AlarmConfig::default().poll_interval_ms));

        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].alarm, "PLC connection lost");
        assert_eq!(alarms[0].state, AlarmState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_then_verified_reconnect_sends_clear() {
        let mut link = MockRegisterLink::new();
        link.expect_describe().return_const("mock".to_string());
        link.expect_close().returning(|| ());
        link.expect_open().times(2).returning(|| Ok(()));
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        link.expect_read_byte().returning(move |addr| {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Ok(CONNECTION_LOST_SENTINEL)
            } else if addr == address::FILTER_ALARM {
                Ok(2)
            } else {
                Ok(4)
            }
        });

        let plc = Arc::new(ConnectionManager::new(
            Box::new(link),
            ConnectionSettings::default(),
        ));
        let notifier = Arc::new(MemoryNotifier::new());
        let mut monitor = AlarmMonitor::new(plc, notifier.clone(), &AlarmConfig::default());

        monitor.poll_once().await;

        assert_eq!(reads.load(Ordering::SeqCst), 6);
        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].alarm, "PLC connection lost");
        assert_eq!(alarms[0].state, AlarmState::Clear);
        assert!(!monitor.ledger().is_active(AlarmSource::Connection));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_session_recovered_in_the_same_tick_sends_clear() {
        let memory = PlcMemory::new();
        let (mut monitor, notifier) = monitor_over(&memory);
        monitor.poll_once().await;

        memory.fail_next(LinkError::ConnectionLost("reset by peer".into()));
        monitor.poll_once().await;

        let alarms = notifier.alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].alarm, "PLC connection lost");
        assert_eq!(alarms[0].state, AlarmState::Clear);
    }
}
