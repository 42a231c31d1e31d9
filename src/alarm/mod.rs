// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Alarm detection
//!
//! The alarm subsystem watches three sensor alarm bytes of the controller plus
//! the health of the link itself, and reports transitions to the edge system.
//!
//! ## Key Components
//!
//! - [`AlarmSource`]: the fixed set of monitored sources with their decode tables
//! - [`ledger::AlarmLedger`]: the latched, debounced detection state machine
//! - [`monitor::AlarmMonitor`]: the background polling loop driving the ledger
//!
//! ## Alarm codes
//!
//! | source | normal | faults |
//! |---|---|---|
//! | oil temperature | 4 | 1 high, 2 low |
//! | liquid level | 4 | 1 high, 2 low |
//! | filter | 2 | 1 clogged |
//!
//! The value 255 on any alarm byte means the controller link is down.

pub mod ledger;
pub mod monitor;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registers::address;

pub use ledger::{AlarmEvent, AlarmLedger, AlarmRecord};
pub use monitor::AlarmMonitor;

/// Alarm byte value meaning "no communication with the controller".
pub const CONNECTION_LOST_SENTINEL: u8 = 255;

/// A monitored alarm source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmSource {
    OilTemperature,
    LiquidLevel,
    Filter,
    Connection,
}

impl AlarmSource {
    /// Sources backed by a physical sensor alarm byte.
    pub const SENSORS: [AlarmSource; 3] = [
        AlarmSource::OilTemperature,
        AlarmSource::LiquidLevel,
        AlarmSource::Filter,
    ];

    /// Register holding this source's alarm byte, `None` for the link itself.
    pub fn address(self) -> Option<u16> {
        match self {
            Self::OilTemperature => Some(address::OIL_TEMPERATURE_ALARM),
            Self::LiquidLevel => Some(address::LIQUID_LEVEL_ALARM),
            Self::Filter => Some(address::FILTER_ALARM),
            Self::Connection => None,
        }
    }

    /// Value reported by the controller when nothing is wrong.
    pub fn normal_value(self) -> u8 {
        match self {
            Self::OilTemperature | Self::LiquidLevel => 4,
            Self::Filter => 2,
            Self::Connection => 0,
        }
    }

    pub fn is_normal(self, value: u8) -> bool {
        value == self.normal_value()
    }

    fn label(self) -> &'static str {
        match self {
            Self::OilTemperature => "oil temperature",
            Self::LiquidLevel => "liquid level",
            Self::Filter => "filter",
            Self::Connection => "PLC connection",
        }
    }

    /// Human description of a raw alarm value.
    pub fn describe(self, value: u8) -> String {
        if value == CONNECTION_LOST_SENTINEL || self == Self::Connection {
            return if self == Self::Connection && value == self.normal_value() {
                "PLC connection normal".to_string()
            } else {
                "PLC connection lost".to_string()
            };
        }
        let text = match (self, value) {
            (Self::OilTemperature, 1) => "oil temperature high",
            (Self::OilTemperature, 2) => "oil temperature low",
            (Self::LiquidLevel, 1) => "liquid level high",
            (Self::LiquidLevel, 2) => "liquid level low",
            (Self::Filter, 1) => "filter clogged",
            (source, v) if source.is_normal(v) => return format!("{} normal", source.label()),
            (source, v) => return format!("{} unknown alarm (code {})", source.label(), v),
        };
        text.to_string()
    }

    /// Decode a raw alarm byte for display.
    pub fn condition(self, value: u8) -> AlarmCondition {
        if value == CONNECTION_LOST_SENTINEL {
            AlarmCondition::CommunicationFault
        } else if self.is_normal(value) {
            AlarmCondition::Normal
        } else {
            AlarmCondition::Fault {
                code: value,
                description: self.describe(value),
            }
        }
    }
}

impl fmt::Display for AlarmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decoded state of one alarm byte, as exposed in the device state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlarmCondition {
    Normal,
    Fault { code: u8, description: String },
    CommunicationFault,
}

impl AlarmCondition {
    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

/// Edge-visible state of an alarm notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Error,
    Clear,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Clear => f.write_str("clear"),
        }
    }
}

/// Raw values of the three sensor alarm bytes from one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmReading {
    pub oil_temperature: u8,
    pub liquid_level: u8,
    pub filter: u8,
}

impl AlarmReading {
    pub fn value(&self, source: AlarmSource) -> Option<u8> {
        match source {
            AlarmSource::OilTemperature => Some(self.oil_temperature),
            AlarmSource::LiquidLevel => Some(self.liquid_level),
            AlarmSource::Filter => Some(self.filter),
            AlarmSource::Connection => None,
        }
    }

    /// Sensor values paired with their source, in poll order.
    pub fn values(&self) -> [(AlarmSource, u8); 3] {
        [
            (AlarmSource::OilTemperature, self.oil_temperature),
            (AlarmSource::LiquidLevel, self.liquid_level),
            (AlarmSource::Filter, self.filter),
        ]
    }

    /// True when any byte carries the connection-loss sentinel.
    pub fn has_sentinel(&self) -> bool {
        self.values()
            .iter()
            .any(|(_, value)| *value == CONNECTION_LOST_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(AlarmSource::OilTemperature.describe(1), "oil temperature high");
        assert_eq!(AlarmSource::LiquidLevel.describe(2), "liquid level low");
        assert_eq!(AlarmSource::Filter.describe(1), "filter clogged");
        assert_eq!(AlarmSource::Filter.describe(2), "filter normal");
        assert_eq!(AlarmSource::Filter.describe(255), "PLC connection lost");
        assert_eq!(
            AlarmSource::LiquidLevel.describe(9),
            "liquid level unknown alarm (code 9)"
        );
        assert_eq!(AlarmSource::Connection.describe(255), "PLC connection lost");
    }

    #[test]
    fn test_condition_decoding_is_total() {
        for source in AlarmSource::SENSORS {
            for raw in 0..=u8::MAX {
                let condition = source.condition(raw);
                assert_eq!(condition.is_fault(), !source.is_normal(raw));
            }
        }
    }

    #[test]
    fn test_reading_sentinel() {
        let reading = AlarmReading {
            oil_temperature: 4,
            liquid_level: 255,
            filter: 2,
        };
        assert!(reading.has_sentinel());
        assert_eq!(reading.value(AlarmSource::Filter), Some(2));
        assert_eq!(reading.value(AlarmSource::Connection), None);
    }
}
