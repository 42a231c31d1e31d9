// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register model of the stability-support PLC
//!
//! This module holds the raw memory mirror of the controller ([`RegisterImage`])
//! and the pure decode/encode helpers used to turn raw bytes into typed values.
//! Nothing in here performs I/O: the connection manager fills a `RegisterImage`
//! after a successful read, every other component only reads from it.
//!
//! ## Register Map
//!
//! ### Byte cells (VB area)
//!
//! - VB1000: control byte, one flag per bit (see [`ControlBit`])
//! - VB1001: support cylinder state (1, 2, 4, 8)
//! - VB1002: platform 1 motion state (1, 2, 4, 8)
//! - VB1003: platform 2 motion state (1, 2, 4, 8)
//! - VB1004: oil temperature alarm
//! - VB1005: liquid level alarm
//! - VB1006: filter alarm
//!
//! ### Float cells (VD area, IEEE-754, big-endian)
//!
//! - VD1010: cylinder pressure
//! - VD1014: lift pressure
//! - VD1018 / VD1022: platform 1 / 2 tilt angle
//! - VD1026 / VD1030: platform 1 / 2 position
//!
//! ### Command bits (M area, momentary)
//!
//! See [`crate::plc::commands`].

pub mod state;

use std::collections::BTreeMap;

pub use state::{
    CylinderState, DeviceState, EmergencyStop, LevelingState, OperationMode, PlatformMotion,
    SwitchState,
};

/// Number of byte cells mirrored from the controller.
pub const BYTE_BANK_SIZE: usize = 2000;

/// Fixed addresses of the controller's memory cells.
pub mod address {
    pub const CONTROL_BYTE: u16 = 1000;
    pub const CYLINDER_STATE: u16 = 1001;
    pub const PLATFORM1_STATE: u16 = 1002;
    pub const PLATFORM2_STATE: u16 = 1003;
    pub const OIL_TEMPERATURE_ALARM: u16 = 1004;
    pub const LIQUID_LEVEL_ALARM: u16 = 1005;
    pub const FILTER_ALARM: u16 = 1006;

    pub const CYLINDER_PRESSURE: u16 = 1010;
    pub const LIFT_PRESSURE: u16 = 1014;
    pub const PLATFORM1_TILT: u16 = 1018;
    pub const PLATFORM2_TILT: u16 = 1022;
    pub const PLATFORM1_POSITION: u16 = 1026;
    pub const PLATFORM2_POSITION: u16 = 1030;

    /// Byte cells read by a full poll, in read order.
    pub const BYTE_CELLS: [u16; 7] = [
        CONTROL_BYTE,
        CYLINDER_STATE,
        PLATFORM1_STATE,
        PLATFORM2_STATE,
        OIL_TEMPERATURE_ALARM,
        LIQUID_LEVEL_ALARM,
        FILTER_ALARM,
    ];

    /// Float cells read by a full poll, in read order.
    pub const FLOAT_CELLS: [u16; 6] = [
        CYLINDER_PRESSURE,
        LIFT_PRESSURE,
        PLATFORM1_TILT,
        PLATFORM2_TILT,
        PLATFORM1_POSITION,
        PLATFORM2_POSITION,
    ];
}

/// Bit positions inside the control byte.
///
/// The order is fixed by the controller program and must not be re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlBit {
    OperationMode = 0,
    EmergencyStop = 1,
    OilPump = 2,
    Heater = 3,
    AirCooling = 4,
    Leveling1 = 5,
    Leveling2 = 6,
}

impl ControlBit {
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Decode a controller float.
///
/// The controller stores floats most significant byte first; decoding is an
/// explicit big-endian interpretation regardless of the host byte order.
pub fn decode_float(bytes: [u8; 4]) -> f32 {
    f32::from_be_bytes(bytes)
}

/// Encode a float the way the controller stores it.
pub fn encode_float(value: f32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Test a single bit of a byte. Bits above 7 are never set.
pub fn is_bit_set(value: u8, bit: u8) -> bool {
    bit < 8 && value & (1 << bit) != 0
}

/// Return `value` with `bit` forced to `on`. Bits above 7 leave the value unchanged.
pub fn set_bit(value: u8, bit: u8, on: bool) -> u8 {
    if bit >= 8 {
        return value;
    }
    if on {
        value | (1 << bit)
    } else {
        value & !(1 << bit)
    }
}

/// Raw memory mirror of the controller.
///
/// Byte cells live in a fixed-size bank indexed by address. Float cells are kept
/// as the four raw big-endian bytes received from the wire and decoded on access.
/// Out-of-range byte addresses read as 0 and are ignored on write.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterImage {
    bytes: Vec<u8>,
    floats: BTreeMap<u16, [u8; 4]>,
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterImage {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; BYTE_BANK_SIZE],
            floats: BTreeMap::new(),
        }
    }

    pub fn get_byte(&self, address: u16) -> u8 {
        self.bytes.get(address as usize).copied().unwrap_or(0)
    }

    pub fn set_byte(&mut self, address: u16, value: u8) {
        if let Some(cell) = self.bytes.get_mut(address as usize) {
            *cell = value;
        }
    }

    /// Decoded float at `address`, 0.0 if the cell was never read.
    pub fn get_float(&self, address: u16) -> f32 {
        self.floats
            .get(&address)
            .map(|raw| decode_float(*raw))
            .unwrap_or(0.0)
    }

    /// Store the raw big-endian bytes of a float cell.
    pub fn set_float_raw(&mut self, address: u16, raw: [u8; 4]) {
        self.floats.insert(address, raw);
    }

    pub fn set_float(&mut self, address: u16, value: f32) {
        self.set_float_raw(address, encode_float(value));
    }

    pub fn is_bit_set(&self, address: u16, bit: u8) -> bool {
        is_bit_set(self.get_byte(address), bit)
    }

    pub fn set_bit(&mut self, address: u16, bit: u8, on: bool) {
        let value = set_bit(self.get_byte(address), bit, on);
        self.set_byte(address, value);
    }

    /// Typed view of this snapshot.
    pub fn device_state(&self) -> DeviceState {
        DeviceState::from_image(self)
    }
}
