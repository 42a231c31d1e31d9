// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC communication
//!
//! This module owns everything that touches the controller:
//!
//! - [`RegisterLink`]: the abstract transport to the controller memory
//! - [`ModbusTcpLink`]: the production transport over Modbus TCP
//! - [`SimulatedLink`] / [`PlcMemory`]: an in-memory controller for bench runs
//! - [`ConnectionManager`]: the single, lock-protected owner of the link, with
//!   reconnect/backoff, failure classification and pulse command semantics
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use stability_gateway::plc::{ConnectionManager, ConnectionSettings, ModbusTcpLink};
//!
//! async fn example() -> Result<(), stability_gateway::plc::PlcError> {
//!     let link = ModbusTcpLink::new("192.168.1.10", 502);
//!     let plc = Arc::new(ConnectionManager::new(Box::new(link), ConnectionSettings::default()));
//!     plc.connect().await?;
//!     let state = plc.device_state().await?;
//!     println!("cylinder: {}", state.cylinder);
//!     plc.execute_command("platform1_raise").await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod error;
pub mod link;
pub mod modbus_link;
pub mod pulse;
pub mod simulated;

pub use commands::{command_bit, MemoryBit};
pub use connection::{ConnectionManager, ConnectionSettings, ConnectionState, MAX_BACKOFF};
pub use error::{LinkError, PlcError};
pub use link::RegisterLink;
pub use modbus_link::ModbusTcpLink;
pub use simulated::{LinkOp, PlcMemory, SimulatedLink};
