// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Typed device state decoded from a [`RegisterImage`].
//!
//! Every decoder in this file is total: any raw byte maps either to a named
//! state or to an explicit `Unknown(raw)` marker.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{address, ControlBit, RegisterImage};
use crate::alarm::{AlarmCondition, AlarmSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStop {
    Normal,
    Engaged,
}

/// On/off state of an auxiliary unit (pump, heater, air cooling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Stopped,
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelingState {
    Idle,
    Leveling,
}

/// Support cylinder state byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CylinderState {
    DownStop,
    DownPressurize,
    UpStop,
    UpPressurize,
    Unknown(u8),
}

impl CylinderState {
    pub fn from_byte(raw: u8) -> Self {
        match raw {
            1 => Self::DownStop,
            2 => Self::DownPressurize,
            4 => Self::UpStop,
            8 => Self::UpPressurize,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for CylinderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownStop => write!(f, "down stop"),
            Self::DownPressurize => write!(f, "down pressurize"),
            Self::UpStop => write!(f, "up stop"),
            Self::UpPressurize => write!(f, "up pressurize"),
            Self::Unknown(raw) => write!(f, "unknown state ({})", raw),
        }
    }
}

/// Lift platform motion state byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformMotion {
    Rising,
    RiseStopped,
    Lowering,
    LowerStopped,
    Unknown(u8),
}

impl PlatformMotion {
    pub fn from_byte(raw: u8) -> Self {
        match raw {
            1 => Self::Rising,
            2 => Self::RiseStopped,
            4 => Self::Lowering,
            8 => Self::LowerStopped,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for PlatformMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::RiseStopped => write!(f, "rise stopped"),
            Self::Lowering => write!(f, "lowering"),
            Self::LowerStopped => write!(f, "lower stopped"),
            Self::Unknown(raw) => write!(f, "unknown state ({})", raw),
        }
    }
}

/// Human-meaningful view of one register snapshot.
///
/// A `DeviceState` is always rebuilt from a whole [`RegisterImage`]; it is never
/// patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub operation_mode: OperationMode,
    pub emergency_stop: EmergencyStop,
    pub oil_pump: SwitchState,
    pub heater: SwitchState,
    pub air_cooling: SwitchState,
    pub leveling1: LevelingState,
    pub leveling2: LevelingState,
    pub cylinder: CylinderState,
    pub platform1: PlatformMotion,
    pub platform2: PlatformMotion,
    pub oil_temperature: AlarmCondition,
    pub liquid_level: AlarmCondition,
    pub filter: AlarmCondition,
    pub cylinder_pressure: f32,
    pub lift_pressure: f32,
    pub platform1_tilt: f32,
    pub platform2_tilt: f32,
    pub platform1_position: f32,
    pub platform2_position: f32,
}

impl DeviceState {
    pub fn from_image(image: &RegisterImage) -> Self {
        let flag = |bit: ControlBit| image.is_bit_set(address::CONTROL_BYTE, bit.index());
        let switch = |bit: ControlBit| {
            if flag(bit) {
                SwitchState::Started
            } else {
                SwitchState::Stopped
            }
        };
        let leveling = |bit: ControlBit| {
            if flag(bit) {
                LevelingState::Leveling
            } else {
                LevelingState::Idle
            }
        };

        Self {
            operation_mode: if flag(ControlBit::OperationMode) {
                OperationMode::Auto
            } else {
                OperationMode::Manual
            },
            emergency_stop: if flag(ControlBit::EmergencyStop) {
                EmergencyStop::Engaged
            } else {
                EmergencyStop::Normal
            },
            oil_pump: switch(ControlBit::OilPump),
            heater: switch(ControlBit::Heater),
            air_cooling: switch(ControlBit::AirCooling),
            leveling1: leveling(ControlBit::Leveling1),
            leveling2: leveling(ControlBit::Leveling2),
            cylinder: CylinderState::from_byte(image.get_byte(address::CYLINDER_STATE)),
            platform1: PlatformMotion::from_byte(image.get_byte(address::PLATFORM1_STATE)),
            platform2: PlatformMotion::from_byte(image.get_byte(address::PLATFORM2_STATE)),
            oil_temperature: AlarmSource::OilTemperature
                .condition(image.get_byte(address::OIL_TEMPERATURE_ALARM)),
            liquid_level: AlarmSource::LiquidLevel
                .condition(image.get_byte(address::LIQUID_LEVEL_ALARM)),
            filter: AlarmSource::Filter.condition(image.get_byte(address::FILTER_ALARM)),
            cylinder_pressure: image.get_float(address::CYLINDER_PRESSURE),
            lift_pressure: image.get_float(address::LIFT_PRESSURE),
            platform1_tilt: image.get_float(address::PLATFORM1_TILT),
            platform2_tilt: image.get_float(address::PLATFORM2_TILT),
            platform1_position: image.get_float(address::PLATFORM1_POSITION),
            platform2_position: image.get_float(address::PLATFORM2_POSITION),
        }
    }
}
