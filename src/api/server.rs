// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket server builder

use std::sync::Arc;

use rocket::figment::Figment;
use rocket::{catchers, routes, Build, Rocket};

use super::cors::CORS;
use super::handlers::*;
use crate::plc::ConnectionManager;
use crate::tasks::TaskPipeline;

/// Everything the handlers need, managed by Rocket.
#[derive(Clone)]
pub struct ApiState {
    pub plc: Arc<ConnectionManager>,
    pub pipeline: TaskPipeline,
    pub plc_host: String,
    pub plc_port: u16,
    pub simulated: bool,
}

/// Build a configured Rocket server instance
///
/// ### Parameters
///
/// * `figment` - The Rocket configuration figment (address, port, ident)
/// * `state` - Handles on the connection manager and the task pipeline
pub fn build_rocket(figment: Figment, state: ApiState) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(CORS)
        .mount(
            "/stability",
            routes![
                health,
                system_info,
                device_state,
                support_control,
                platform_height_control,
                platform_horizontal_control,
                error_report,
                options,
            ],
        )
        .register("/", catchers![not_found, unprocessable, default_catcher])
        .manage(state)
}
