// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory controller used for bench runs and tests.
//!
//! [`PlcMemory`] is a shared register memory with fault injection. It backs both
//! [`SimulatedLink`] (an in-process [`RegisterLink`]) and the Modbus TCP
//! simulator service in [`crate::modbus`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;

use super::error::LinkError;
use super::link::RegisterLink;
use super::commands::command_bit;
use crate::registers::{address, encode_float, set_bit, ControlBit, BYTE_BANK_SIZE};

/// One register link operation seen by the simulated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    Open,
    ReadByte(u16),
    ReadFloat(u16),
    WriteBit(u16, bool),
}

#[derive(Debug)]
struct MemoryState {
    bytes: Vec<u8>,
    floats: BTreeMap<u16, [u8; 4]>,
    coils: BTreeMap<u16, bool>,
    online: bool,
    pending_failures: VecDeque<LinkError>,
    journal: Vec<LinkOp>,
}

/// Shared simulated controller memory.
///
/// Cloning a `PlcMemory` yields another handle to the same memory.
#[derive(Debug, Clone)]
pub struct PlcMemory {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for PlcMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlcMemory {
    /// Create a memory image of an idle, healthy machine.
    pub fn new() -> Self {
        let mut bytes = vec![0; BYTE_BANK_SIZE];
        bytes[address::CYLINDER_STATE as usize] = 1;
        bytes[address::PLATFORM1_STATE as usize] = 8;
        bytes[address::PLATFORM2_STATE as usize] = 8;
        bytes[address::OIL_TEMPERATURE_ALARM as usize] = 4;
        bytes[address::LIQUID_LEVEL_ALARM as usize] = 4;
        bytes[address::FILTER_ALARM as usize] = 2;

        let floats = address::FLOAT_CELLS
            .iter()
            .map(|addr| (*addr, encode_float(0.0)))
            .collect();

        Self {
            state: Arc::new(Mutex::new(MemoryState {
                bytes,
                floats,
                coils: BTreeMap::new(),
                online: true,
                pending_failures: VecDeque::new(),
                journal: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Poisoning leaves the register data intact.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn byte(&self, addr: u16) -> Option<u8> {
        self.lock().bytes.get(addr as usize).copied()
    }

    pub fn set_byte(&self, addr: u16, value: u8) {
        if let Some(cell) = self.lock().bytes.get_mut(addr as usize) {
            *cell = value;
        }
    }

    pub fn float_raw(&self, addr: u16) -> Option<[u8; 4]> {
        self.lock().floats.get(&addr).copied()
    }

    pub fn set_float(&self, addr: u16, value: f32) {
        self.set_float_raw(addr, encode_float(value));
    }

    pub fn set_float_raw(&self, addr: u16, raw: [u8; 4]) {
        self.lock().floats.insert(addr, raw);
    }

    /// Move the simulated machine as if the command on `coil` had been pressed.
    ///
    /// Motions complete instantly: a raise leaves the platform in "rise
    /// stopped" 100 mm higher, a rigid support leaves the cylinder pressurized
    /// up. Unknown coils are ignored.
    pub fn apply_command(&self, coil: u16) {
        let Some(name) = super::commands::command_names()
            .find(|name| command_bit(name).map(|bit| bit.coil()) == Some(coil))
        else {
            return;
        };

        let mut state = self.lock();
        let platform = |name: &str| {
            if name.starts_with("platform2") {
                (
                    address::PLATFORM2_STATE,
                    address::PLATFORM2_POSITION,
                    ControlBit::Leveling2,
                )
            } else {
                (
                    address::PLATFORM1_STATE,
                    address::PLATFORM1_POSITION,
                    ControlBit::Leveling1,
                )
            }
        };
        let (state_addr, position_addr, leveling) = platform(name);
        let control = address::CONTROL_BYTE as usize;

        match name {
            "support_rigid" => state.bytes[address::CYLINDER_STATE as usize] = 8,
            "support_flexible" => state.bytes[address::CYLINDER_STATE as usize] = 1,
            _ if name.ends_with("_raise") || name.ends_with("_lower") => {
                let raise = name.ends_with("_raise");
                state.bytes[state_addr as usize] = if raise { 2 } else { 8 };
                let position = state
                    .floats
                    .get(&position_addr)
                    .map(|raw| f32::from_be_bytes(*raw))
                    .unwrap_or(0.0);
                let next = if raise {
                    position + 100.0
                } else {
                    (position - 100.0).max(0.0)
                };
                state.floats.insert(position_addr, encode_float(next));
            }
            _ if name.ends_with("_level_reset") => {
                state.bytes[control] = set_bit(state.bytes[control], leveling.index(), false);
            }
            _ if name.ends_with("_level") => {
                state.bytes[control] = set_bit(state.bytes[control], leveling.index(), true);
                let tilt = if leveling == ControlBit::Leveling1 {
                    address::PLATFORM1_TILT
                } else {
                    address::PLATFORM2_TILT
                };
                state.floats.insert(tilt, encode_float(0.0));
            }
            _ => {}
        }
        debug!("Simulated PLC applied {}", name);
    }

    pub fn coil(&self, addr: u16) -> bool {
        self.lock().coils.get(&addr).copied().unwrap_or(false)
    }

    pub fn set_coil(&self, addr: u16, value: bool) {
        self.lock().coils.insert(addr, value);
    }

    /// Simulate the controller going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    /// Make the next link request fail with `error`.
    pub fn fail_next(&self, error: LinkError) {
        self.lock().pending_failures.push_back(error);
    }

    /// Operations seen so far, in order.
    pub fn journal(&self) -> Vec<LinkOp> {
        self.lock().journal.clone()
    }

    /// Coil writes seen so far, in order.
    pub fn coil_writes(&self) -> Vec<(u16, bool)> {
        self.lock()
            .journal
            .iter()
            .filter_map(|op| match op {
                LinkOp::WriteBit(addr, value) => Some((*addr, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Record `op` and return the injected failure for it, if any.
    fn admit(&self, op: LinkOp) -> Result<(), LinkError> {
        let mut state = self.lock();
        state.journal.push(op);
        if !state.online {
            return Err(LinkError::ConnectionLost("controller offline".to_string()));
        }
        match state.pending_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-process register link over a [`PlcMemory`].
#[derive(Debug)]
pub struct SimulatedLink {
    memory: PlcMemory,
    open: bool,
    command_effects: bool,
}

impl SimulatedLink {
    pub fn new(memory: PlcMemory) -> Self {
        Self {
            memory,
            open: false,
            command_effects: false,
        }
    }

    /// Make command pulses move the simulated machine (see [`PlcMemory::apply_command`]).
    pub fn with_command_effects(mut self) -> Self {
        self.command_effects = true;
        self
    }

    pub fn memory(&self) -> &PlcMemory {
        &self.memory
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.open {
            Ok(())
        } else {
            Err(LinkError::ConnectionLost("not connected".to_string()))
        }
    }
}

#[async_trait]
impl RegisterLink for SimulatedLink {
    async fn open(&mut self) -> Result<(), LinkError> {
        self.open = false;
        self.memory.admit(LinkOp::Open)?;
        self.open = true;
        debug!("Simulated PLC session opened");
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
    }

    async fn read_byte(&mut self, addr: u16) -> Result<u8, LinkError> {
        self.ensure_open()?;
        self.memory.admit(LinkOp::ReadByte(addr))?;
        self.memory
            .byte(addr)
            .ok_or_else(|| LinkError::Transient(format!("illegal byte address {}", addr)))
    }

    async fn read_float_raw(&mut self, addr: u16) -> Result<[u8; 4], LinkError> {
        self.ensure_open()?;
        self.memory.admit(LinkOp::ReadFloat(addr))?;
        self.memory
            .float_raw(addr)
            .ok_or_else(|| LinkError::Transient(format!("illegal float address {}", addr)))
    }

    async fn write_bit(&mut self, addr: u16, value: bool) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.memory.admit(LinkOp::WriteBit(addr, value))?;
        let rising = value && !self.memory.coil(addr);
        self.memory.set_coil(addr, value);
        if rising && self.command_effects {
            self.memory.apply_command(addr);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_link_reads_and_writes() {
        let memory = PlcMemory::new();
        memory.set_float(address::LIFT_PRESSURE, 7.5);
        let mut link = SimulatedLink::new(memory.clone());

        assert!(link.read_byte(address::FILTER_ALARM).await.is_err());
        link.open().await.unwrap();
        assert_eq!(link.read_byte(address::FILTER_ALARM).await.unwrap(), 2);
        assert_eq!(
            link.read_float_raw(address::LIFT_PRESSURE).await.unwrap(),
            7.5f32.to_be_bytes()
        );
        link.write_bit(177, true).await.unwrap();
        assert!(memory.coil(177));
        assert_eq!(memory.coil_writes(), vec![(177, true)]);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let memory = PlcMemory::new();
        let mut link = SimulatedLink::new(memory.clone());
        link.open().await.unwrap();

        memory.fail_next(LinkError::Transient("glitch".into()));
        assert_eq!(
            link.read_byte(address::CONTROL_BYTE).await,
            Err(LinkError::Transient("glitch".into()))
        );
        assert!(link.read_byte(address::CONTROL_BYTE).await.is_ok());

        memory.set_online(false);
        assert!(link
            .read_byte(address::CONTROL_BYTE)
            .await
            .unwrap_err()
            .is_connection_loss());
        assert!(link.open().await.is_err());
    }

    #[tokio::test]
    async fn test_command_effects() {
        let memory = PlcMemory::new();
        let mut link = SimulatedLink::new(memory.clone()).with_command_effects();
        link.open().await.unwrap();

        let raise = command_bit("platform2_raise").unwrap().coil();
        link.write_bit(raise, true).await.unwrap();
        link.write_bit(raise, false).await.unwrap();
        assert_eq!(memory.byte(address::PLATFORM2_STATE), Some(2));
        assert_eq!(
            memory.float_raw(address::PLATFORM2_POSITION),
            Some(100.0f32.to_be_bytes())
        );

        let level = command_bit("platform1_level").unwrap().coil();
        link.write_bit(level, true).await.unwrap();
        let control = memory.byte(address::CONTROL_BYTE).unwrap();
        assert!(crate::registers::is_bit_set(control, ControlBit::Leveling1.index()));

        let rigid = command_bit("support_rigid").unwrap().coil();
        link.write_bit(rigid, true).await.unwrap();
        assert_eq!(memory.byte(address::CYLINDER_STATE), Some(8));
    }
}
