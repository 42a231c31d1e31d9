// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Abstract register link to the controller.
//!
//! The connection manager only talks to the controller through this trait, so
//! the wire protocol can be swapped (Modbus TCP, simulator, test mock).

use async_trait::async_trait;

use super::error::LinkError;

/// Raw access to the controller's memory.
///
/// Implementations are driven by a single owner under a lock; they never need
/// internal synchronisation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegisterLink: Send {
    /// Open (or reopen) the session. An already open session is replaced.
    async fn open(&mut self) -> Result<(), LinkError>;

    /// Close the session. Closing a closed link is a no-op.
    async fn close(&mut self);

    /// Read one byte cell.
    async fn read_byte(&mut self, address: u16) -> Result<u8, LinkError>;

    /// Read the four raw bytes of a float cell, most significant first.
    async fn read_float_raw(&mut self, address: u16) -> Result<[u8; 4], LinkError>;

    /// Write one command bit.
    async fn write_bit(&mut self, address: u16, value: bool) -> Result<(), LinkError>;

    /// Short name used in logs.
    fn describe(&self) -> String;
}
