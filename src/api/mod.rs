// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Inbound HTTP API
//!
//! A thin Rocket layer in front of the core: state reads go straight to the
//! [`ConnectionManager`](crate::plc::ConnectionManager), control requests are
//! validated and handed to the [`TaskPipeline`](crate::tasks::TaskPipeline).
//!
//! ## Endpoints
//!
//! | method | path | purpose |
//! |---|---|---|
//! | GET | `/stability/health` | liveness |
//! | GET | `/stability/system/info` | version and PLC endpoint |
//! | GET | `/stability/device/state` | fresh device state |
//! | POST | `/stability/support/control` | rigid / flexible support |
//! | POST | `/stability/platformHeight/control` | raise / lower a platform |
//! | POST | `/stability/platformHorizontal/control` | level / level reset a platform |

pub mod cors;
pub mod handlers;
pub mod server;

pub use server::{build_rocket, ApiState};
