// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Latched, debounced alarm state machine.
//!
//! The ledger is pure: callers hand it observations together with the
//! current instant and get back the events that must be reported. This keeps
//! debounce timing testable without a running clock.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use log::debug;

use super::{AlarmSource, AlarmState, CONNECTION_LOST_SENTINEL};

/// Default minimum delay between two reports of the same unresolved alarm.
pub const DEFAULT_REREPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Report bookkeeping for one `(source, value)` alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmRecord {
    pub reported: bool,
    pub last_report: Instant,
}

/// A transition to be reported to the edge system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEvent {
    pub source: AlarmSource,
    pub value: u8,
    pub description: String,
    pub state: AlarmState,
}

impl AlarmEvent {
    fn new(source: AlarmSource, value: u8, state: AlarmState) -> Self {
        Self {
            source,
            value,
            description: source.describe(value),
            state,
        }
    }
}

/// Alarm records and the set of unresolved alarms, keyed by `(source, value)`.
#[derive(Debug)]
pub struct AlarmLedger {
    records: HashMap<(AlarmSource, u8), AlarmRecord>,
    active: BTreeSet<(AlarmSource, u8)>,
    rereport_interval: Duration,
}

impl Default for AlarmLedger {
    fn default() -> Self {
        Self::new(DEFAULT_REREPORT_INTERVAL)
    }
}

impl AlarmLedger {
    pub fn new(rereport_interval: Duration) -> Self {
        Self {
            records: HashMap::new(),
            active: BTreeSet::new(),
            rereport_interval,
        }
    }

    /// Feed one observed sensor value and return the events it produces.
    ///
    /// - back to normal: one `Clear` per unresolved fault of the source
    /// - new fault, or a different fault than the unresolved one: immediate `Error`
    /// - same fault: `Error` again only once the re-report interval has elapsed
    pub fn observe(&mut self, source: AlarmSource, value: u8, now: Instant) -> Vec<AlarmEvent> {
        if source.is_normal(value) {
            return self.clear_source(source);
        }

        let key = (source, value);
        if let Some(record) = self.records.get_mut(&key) {
            if record.reported && now.duration_since(record.last_report) < self.rereport_interval
            {
                debug!("Suppressing repeated {} alarm (value {})", source, value);
                return Vec::new();
            }
            record.reported = true;
            record.last_report = now;
            self.active.insert(key);
            return vec![AlarmEvent::new(source, value, AlarmState::Error)];
        }

        // A different fault replaces whatever this source had before.
        let superseded: Vec<_> = self
            .active
            .iter()
            .filter(|(s, _)| *s == source)
            .copied()
            .collect();
        for old in superseded {
            debug!("{} alarm value {} superseded by {}", source, old.1, value);
            self.active.remove(&old);
            self.records.remove(&old);
        }

        self.records.insert(
            key,
            AlarmRecord {
                reported: true,
                last_report: now,
            },
        );
        self.active.insert(key);
        vec![AlarmEvent::new(source, value, AlarmState::Error)]
    }

    /// Report an alarm regardless of the re-report interval.
    pub fn force_report(&mut self, source: AlarmSource, value: u8, now: Instant) -> AlarmEvent {
        let key = (source, value);
        self.records.insert(
            key,
            AlarmRecord {
                reported: true,
                last_report: now,
            },
        );
        self.active.insert(key);
        AlarmEvent::new(source, value, AlarmState::Error)
    }

    /// Report the link as down, bypassing the debounce.
    pub fn force_connection_lost(&mut self, now: Instant) -> AlarmEvent {
        self.force_report(AlarmSource::Connection, CONNECTION_LOST_SENTINEL, now)
    }

    /// Report the link as restored after a verified reconnect.
    ///
    /// Always yields a `Clear`, whether or not the loss had been reported.
    pub fn force_connection_restored(&mut self) -> AlarmEvent {
        self.clear_source(AlarmSource::Connection);
        AlarmEvent::new(
            AlarmSource::Connection,
            CONNECTION_LOST_SENTINEL,
            AlarmState::Clear,
        )
    }

    /// Clear every unresolved alarm of `source`. Produces nothing when the
    /// source has no unresolved alarm.
    pub fn clear_source(&mut self, source: AlarmSource) -> Vec<AlarmEvent> {
        let resolved: Vec<_> = self
            .active
            .iter()
            .filter(|(s, _)| *s == source)
            .copied()
            .collect();
        resolved
            .into_iter()
            .map(|key| {
                self.active.remove(&key);
                self.records.remove(&key);
                AlarmEvent::new(key.0, key.1, AlarmState::Clear)
            })
            .collect()
    }

    pub fn is_active(&self, source: AlarmSource) -> bool {
        self.active.iter().any(|(s, _)| *s == source)
    }

    pub fn record(&self, source: AlarmSource, value: u8) -> Option<&AlarmRecord> {
        self.records.get(&(source, value))
    }

    /// Unresolved alarms in a stable order.
    pub fn active(&self) -> impl Iterator<Item = &(AlarmSource, u8)> {
        self.active.iter()
    }
}
