// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Connection manager
//!
//! Owns the single register link to the controller. Every public operation
//! holds one async mutex for its whole duration, which makes this type the
//! only serialisation point of the gateway: a full read never interleaves with
//! a command write, a pulse reset, or a reconnect.
//!
//! ## Failure handling
//!
//! Link failures are classified by [`LinkError`]. A connection loss closes the
//! link and marks the manager [`ConnectionState::Disconnected`]; the next
//! operation reconnects inline (with backoff) before touching the registers.
//! A transient failure is returned for that one operation only.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use super::commands::command_bit;
use super::error::{LinkError, PlcError};
use super::link::RegisterLink;
use super::pulse::PulseScheduler;
use crate::alarm::{AlarmReading, AlarmSource};
use crate::config::PlcConfig;
use crate::registers::{address, DeviceState, RegisterImage};

/// Link state as seen by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Upper bound of the wait between two connect attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Connect and pulse timings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Retries after the first failed connect attempt.
    pub connect_retries: u32,
    /// Wait before the first retry.
    pub initial_backoff: Duration,
    /// Growth factor of the wait between retries.
    pub backoff_multiplier: f64,
    /// Pause after a fresh session before the first request.
    pub settle_delay: Duration,
    /// Time a command bit stays high.
    pub pulse_duration: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            backoff_multiplier: 1.5,
            settle_delay: Duration::from_millis(500),
            pulse_duration: Duration::from_millis(1000),
        }
    }
}

impl From<&PlcConfig> for ConnectionSettings {
    fn from(config: &PlcConfig) -> Self {
        Self {
            connect_retries: config.connect_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            pulse_duration: Duration::from_millis(config.pulse_duration_ms),
        }
    }
}

impl ConnectionSettings {
    /// Wait before retry number `retry` (0-based): 1s, 1.5s, 2.25s with defaults.
    ///
    /// Never longer than [`MAX_BACKOFF`].
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(retry.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

struct LinkSlot {
    link: Box<dyn RegisterLink>,
    state: ConnectionState,
}

impl LinkSlot {
    /// Classify a link failure, dropping the session on connection loss.
    async fn fail(&mut self, err: LinkError) -> PlcError {
        if err.is_connection_loss() {
            warn!("PLC link {} lost: {}", self.link.describe(), err);
            self.link.close().await;
            self.state = ConnectionState::Disconnected;
        } else {
            debug!("Transient PLC error on {}: {}", self.link.describe(), err);
        }
        err.into()
    }

    async fn connect(&mut self, settings: &ConnectionSettings) -> Result<(), PlcError> {
        let attempts = settings.connect_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let wait = settings.backoff(attempt - 1);
                debug!(
                    "Retrying PLC connection in {:?} (attempt {}/{})",
                    wait,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(wait).await;
            }

            match self.link.open().await {
                Ok(()) => {
                    // The controller drops the first request of a fresh session if it comes too early.
                    tokio::time::sleep(settings.settle_delay).await;
                    self.state = ConnectionState::Connected;
                    info!(
                        "Connected to PLC {} (attempt {}/{})",
                        self.link.describe(),
                        attempt + 1,
                        attempts
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "PLC connection attempt {}/{} to {} failed: {}",
                        attempt + 1,
                        attempts,
                        self.link.describe(),
                        e
                    );
                    last_error = e.to_string();
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(PlcError::ConnectFailed {
            endpoint: self.link.describe(),
            attempts,
            reason: last_error,
        })
    }

    async fn ensure_connected(&mut self, settings: &ConnectionSettings) -> Result<(), PlcError> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        debug!("PLC link is down, reconnecting before request");
        self.connect(settings).await
    }

    async fn read_byte(&mut self, addr: u16) -> Result<u8, PlcError> {
        match self.link.read_byte(addr).await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn read_float_raw(&mut self, addr: u16) -> Result<[u8; 4], PlcError> {
        match self.link.read_float_raw(addr).await {
            Ok(raw) => Ok(raw),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn write_bit(&mut self, coil: u16, value: bool) -> Result<(), PlcError> {
        match self.link.write_bit(coil, value).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }
}

/// Single owner of the controller link.
///
/// Shared between components as `Arc<ConnectionManager>`.
pub struct ConnectionManager {
    slot: Arc<Mutex<LinkSlot>>,
    settings: ConnectionSettings,
    pulses: PulseScheduler,
    endpoint: String,
}

impl ConnectionManager {
    pub fn new(link: Box<dyn RegisterLink>, settings: ConnectionSettings) -> Self {
        let endpoint = link.describe();
        Self {
            slot: Arc::new(Mutex::new(LinkSlot {
                link,
                state: ConnectionState::Disconnected,
            })),
            settings,
            pulses: PulseScheduler::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Current link state. Waits for any in-flight operation to finish.
    pub async fn state(&self) -> ConnectionState {
        self.slot.lock().await.state
    }

    /// Connect if not already connected.
    pub async fn connect(&self) -> Result<(), PlcError> {
        let mut slot = self.slot.lock().await;
        if slot.state == ConnectionState::Connected {
            return Ok(());
        }
        slot.connect(&self.settings).await
    }

    /// Drop the current session and open a fresh one.
    pub async fn reconnect(&self) -> Result<(), PlcError> {
        let mut slot = self.slot.lock().await;
        slot.link.close().await;
        slot.state = ConnectionState::Disconnected;
        slot.connect(&self.settings).await
    }

    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        slot.link.close().await;
        if slot.state == ConnectionState::Connected {
            info!("Disconnected from PLC {}", slot.link.describe());
        }
        slot.state = ConnectionState::Disconnected;
    }

    /// Read every register needed for a [`DeviceState`], in a fixed order.
    ///
    /// The first failure aborts the read; no partial image is returned.
    pub async fn read_all(&self) -> Result<RegisterImage, PlcError> {
        let mut slot = self.slot.lock().await;
        slot.ensure_connected(&self.settings).await?;

        let mut image = RegisterImage::new();
        for addr in address::BYTE_CELLS {
            let value = slot.read_byte(addr).await?;
            image.set_byte(addr, value);
        }
        for addr in address::FLOAT_CELLS {
            let raw = slot.read_float_raw(addr).await?;
            image.set_float_raw(addr, raw);
        }
        Ok(image)
    }

    /// Fresh decoded device state.
    pub async fn device_state(&self) -> Result<DeviceState, PlcError> {
        Ok(self.read_all().await?.device_state())
    }

    /// Read only the three sensor alarm bytes.
    pub async fn read_alarms(&self) -> Result<AlarmReading, PlcError> {
        let mut slot = self.slot.lock().await;
        slot.ensure_connected(&self.settings).await?;

        let mut values = [0u8; 3];
        for (value, source) in values.iter_mut().zip(AlarmSource::SENSORS) {
            if let Some(addr) = source.address() {
                *value = slot.read_byte(addr).await?;
            }
        }
        Ok(AlarmReading {
            oil_temperature: values[0],
            liquid_level: values[1],
            filter: values[2],
        })
    }

    /// Pulse the command bit mapped to `name`.
    ///
    /// The bit is written to 1 now and back to 0 after the pulse duration. The
    /// reset runs under the same lock and is skipped if the link went down in
    /// the meantime.
    pub async fn execute_command(&self, name: &str) -> Result<(), PlcError> {
        let bit = command_bit(name).ok_or_else(|| PlcError::UnknownCommand(name.to_string()))?;
        let coil = bit.coil();

        let ticket = {
            let mut slot = self.slot.lock().await;
            slot.ensure_connected(&self.settings).await?;
            slot.write_bit(coil, true).await?;
            self.pulses.issue(coil)
        };
        info!("Command {} pulsed on {} (coil {})", name, bit, coil);

        let slot = Arc::clone(&self.slot);
        let command = name.to_string();
        self.pulses
            .schedule(ticket, self.settings.pulse_duration, move |ticket| async move {
                let mut slot = slot.lock().await;
                if !ticket.is_current() {
                    debug!("Reset of {} ({}) left to the newer pulse", command, bit);
                    return;
                }
                if slot.state != ConnectionState::Connected {
                    warn!("Skipping reset of {} ({}): PLC disconnected", command, bit);
                    return;
                }
                match slot.write_bit(coil, false).await {
                    Ok(()) => debug!("Command {} reset on {}", command, bit),
                    Err(e) => warn!("Failed to reset {} ({}): {}", command, bit, e),
                }
            });
        Ok(())
    }

    /// Number of command resets still scheduled.
    pub fn pending_resets(&self) -> usize {
        self.pulses.pending()
    }

    /// Let pending resets run, then close the link.
    pub async fn shutdown(&self) {
        self.pulses.flush().await;
        self.disconnect().await;
    }

    /// Drop pending resets without running them.
    pub fn cancel_pending_resets(&self) {
        self.pulses.cancel_all();
    }
}
