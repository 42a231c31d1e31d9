// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP simulator of the stability controller
//!
//! This module exposes a [`PlcMemory`](crate::plc::PlcMemory) over Modbus TCP
//! with the same register layout as the real controller gateway, so the
//! gateway (or any Modbus client) can be exercised on a bench without the
//! hardware.
//!
//! ## Register Map
//!
//! ### Holding Registers
//!
//! - Registers 1000-1006: byte cells (control byte, state bytes, alarm bytes),
//!   value in the low byte
//! - Registers 1010/1011, 1014/1015, ... 1030/1031: float cells, most
//!   significant word first
//!
//! ### Coils
//!
//! - Coils 177-186: momentary command bits M22.1 to M23.2
//!
//! ## Usage
//!
//! ```no_run
//! use stability_gateway::modbus::serve_simulator;
//! use stability_gateway::plc::PlcMemory;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5020").await?;
//! serve_simulator(listener, PlcMemory::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod modbus_server;

pub use modbus_server::{serve_simulator, PlcSimulatorService};
