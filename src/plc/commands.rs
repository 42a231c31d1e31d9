// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Momentary command bits of the controller (M area).
//!
//! | command | bit | coil |
//! |---|---|---|
//! | `support_rigid` | M22.1 | 177 |
//! | `support_flexible` | M22.2 | 178 |
//! | `platform1_raise` | M22.3 | 179 |
//! | `platform1_lower` | M22.4 | 180 |
//! | `platform2_raise` | M22.5 | 181 |
//! | `platform2_lower` | M22.6 | 182 |
//! | `platform1_level` | M22.7 | 183 |
//! | `platform1_level_reset` | M23.0 | 184 |
//! | `platform2_level` | M23.1 | 185 |
//! | `platform2_level_reset` | M23.2 | 186 |

use std::fmt;

/// Address of a bit in the controller's M area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryBit {
    pub byte: u16,
    pub bit: u8,
}

impl MemoryBit {
    pub const fn new(byte: u16, bit: u8) -> Self {
        Self { byte, bit }
    }

    /// Flat coil address used on the wire.
    pub const fn coil(self) -> u16 {
        self.byte * 8 + self.bit as u16
    }
}

impl fmt::Display for MemoryBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}.{}", self.byte, self.bit)
    }
}

const COMMANDS: [(&str, MemoryBit); 10] = [
    ("support_rigid", MemoryBit::new(22, 1)),
    ("support_flexible", MemoryBit::new(22, 2)),
    ("platform1_raise", MemoryBit::new(22, 3)),
    ("platform1_lower", MemoryBit::new(22, 4)),
    ("platform2_raise", MemoryBit::new(22, 5)),
    ("platform2_lower", MemoryBit::new(22, 6)),
    ("platform1_level", MemoryBit::new(22, 7)),
    ("platform1_level_reset", MemoryBit::new(23, 0)),
    ("platform2_level", MemoryBit::new(23, 1)),
    ("platform2_level_reset", MemoryBit::new(23, 2)),
];

/// Look up the command bit for a controller command name.
pub fn command_bit(name: &str) -> Option<MemoryBit> {
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, bit)| *bit)
}

/// All known command names.
pub fn command_names() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|(name, _)| *name)
}
