// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Stability platform gateway library
//!
//! Bridges a stability platform PLC (fixed register map over Modbus TCP) and an
//! upstream edge system that issues commands and expects callbacks.
//!
//! - [`registers`]: typed decoding of the controller register image
//! - [`plc`]: the single, self-healing controller link
//! - [`alarm`]: debounced alarm detection and its polling loop
//! - [`tasks`]: the single-writer command pipeline
//! - [`callback`]: outbound notifications to the edge system
//! - [`api`]: the inbound HTTP API
//! - [`modbus`]: a Modbus TCP simulator of the controller

pub mod alarm;
pub mod api;
pub mod callback;
pub mod config;
pub mod daemon;
pub mod modbus;
pub mod plc;
pub mod registers;
pub mod tasks;
pub mod utility;
