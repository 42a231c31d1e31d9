// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Route handlers and their request/response bodies
//!
//! Every error answer has the shape `{"msg": "error", "error": "<detail>"}`.

use std::path::PathBuf;

use log::{debug, error, info, warn};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{catch, get, options, post, Request, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::ApiState;
use crate::registers::DeviceState;
use crate::tasks::Task;

const SUCCESS: &str = "success";

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub msg: String,
    pub error: String,
}

pub type ApiError = status::Custom<Json<ErrorBody>>;

fn api_error(status: Status, error: impl Into<String>) -> ApiError {
    status::Custom(
        status,
        Json(ErrorBody {
            msg: "error".to_string(),
            error: error.into(),
        }),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfoResponse {
    pub msg: String,
    pub version: String,
    pub plc_host: String,
    pub plc_port: u16,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStateResponse {
    pub msg: String,
    #[serde(flatten)]
    pub state: DeviceState,
}

/// Body of `POST /stability/support/control`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportControlRequest {
    pub task_id: i64,
    pub defect_id: i64,
    pub state: String,
}

/// Body of the two platform control endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformControlRequest {
    pub task_id: i64,
    pub defect_id: i64,
    pub platform_num: u8,
    pub state: String,
}

/// Answer to an accepted control request. The outcome comes later as a callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlAccepted {
    pub msg: String,
    pub task_id: i64,
    pub defect_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_num: Option<u8>,
    pub state: String,
    pub status: String,
}

fn parse_body<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, ApiError> {
    body.map(Json::into_inner).map_err(|e| {
        debug!("Rejected request body: {}", e);
        api_error(Status::BadRequest, format!("invalid request body: {}", e))
    })
}

fn check_state(state: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(api_error(
            Status::BadRequest,
            format!(
                "invalid state '{}', expected one of: {}",
                state,
                allowed.join(", ")
            ),
        ))
    }
}

fn check_platform(platform_num: u8) -> Result<(), ApiError> {
    if matches!(platform_num, 1 | 2) {
        Ok(())
    } else {
        Err(api_error(
            Status::BadRequest,
            format!("invalid platformNum {}, expected 1 or 2", platform_num),
        ))
    }
}

fn submit(state: &ApiState, task: Task) -> Result<ControlAccepted, ApiError> {
    let accepted = ControlAccepted {
        msg: SUCCESS.to_string(),
        task_id: task.task_id,
        defect_id: task.defect_id,
        platform_num: task.target.as_deref().and_then(|t| t.parse().ok()),
        state: task.operation.clone(),
        status: "processing".to_string(),
    };
    state.pipeline.submit(task).map_err(|e| {
        warn!("Cannot accept control request: {}", e);
        api_error(Status::ServiceUnavailable, e.to_string())
    })?;
    Ok(accepted)
}

/// Liveness check
///
/// **Endpoint:** `GET /stability/health`
#[get("/health")]
pub fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

#[get("/system/info")]
pub fn system_info(state: &State<ApiState>) -> Json<SystemInfoResponse> {
    Json(SystemInfoResponse {
        msg: SUCCESS.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        plc_host: state.plc_host.clone(),
        plc_port: state.plc_port,
        simulated: state.simulated,
    })
}

/// Fresh device state
///
/// **Endpoint:** `GET /stability/device/state[?fields=a,b]`
///
/// Reads the whole register image on every call. When the controller cannot be
/// reached the answer is `503` and no state at all; a cached snapshot is never
/// served.
///
/// `fields` is a comma separated list of camelCase keys to keep. `msg` is
/// always kept and unknown keys are ignored.
#[get("/device/state?<fields>")]
pub async fn device_state(
    state: &State<ApiState>,
    fields: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let device = state.plc.device_state().await.map_err(|e| {
        warn!("Device state unavailable: {}", e);
        api_error(Status::ServiceUnavailable, e.to_string())
    })?;

    let body = serde_json::to_value(DeviceStateResponse {
        msg: SUCCESS.to_string(),
        state: device,
    })
    .map_err(|e| api_error(Status::InternalServerError, e.to_string()))?;

    Ok(Json(match fields {
        Some(fields) => select_fields(body, &fields),
        None => body,
    }))
}

/// Keep `msg` and the listed keys of a JSON object.
fn select_fields(body: Value, fields: &str) -> Value {
    let wanted: Vec<&str> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if wanted.is_empty() {
        return body;
    }
    match body {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key == "msg" || wanted.contains(&key.as_str()))
                .collect(),
        ),
        other => other,
    }
}

/// Body of `POST /stability/error/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReportRequest {
    pub alarm: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReportResponse {
    pub msg: String,
    pub alarm: String,
    pub timestamp: i64,
}

/// Alarm reported by another system
///
/// **Endpoint:** `POST /stability/error/report`
///
/// The alarm is only logged and echoed back.
#[post("/error/report", format = "json", data = "<body>")]
pub fn error_report(
    body: Result<Json<ErrorReportRequest>, json::Error<'_>>,
) -> Result<Json<ErrorReportResponse>, ApiError> {
    let report = parse_body(body)?;
    error!(
        "Reported alarm: source={}, level={}, alarm={}",
        report.source.as_deref().unwrap_or("unknown"),
        report.level.as_deref().unwrap_or("warning"),
        report.alarm
    );
    Ok(Json(ErrorReportResponse {
        msg: SUCCESS.to_string(),
        alarm: report.alarm,
        timestamp: chrono::Utc::now().timestamp_millis(),
    }))
}

/// Support control
///
/// **Endpoint:** `POST /stability/support/control`
///
/// ### Request Body
///
/// ```json
/// { "taskId": 1, "defectId": 9, "state": "rigid" }
/// ```
///
/// `state` is `rigid` or `flexible`.
#[post("/support/control", format = "json", data = "<body>")]
pub fn support_control(
    state: &State<ApiState>,
    body: Result<Json<SupportControlRequest>, json::Error<'_>>,
) -> Result<Json<ControlAccepted>, ApiError> {
    let request = parse_body(body)?;
    check_state(&request.state, &["rigid", "flexible"])?;
    info!(
        "Support control request: task {} defect {} -> {}",
        request.task_id, request.defect_id, request.state
    );
    let task = Task::new(request.task_id, request.defect_id, request.state);
    submit(state, task).map(Json)
}

/// Platform height control
///
/// **Endpoint:** `POST /stability/platformHeight/control`
///
/// `state` is `up` or `down`, `platformNum` is 1 or 2.
#[post("/platformHeight/control", format = "json", data = "<body>")]
pub fn platform_height_control(
    state: &State<ApiState>,
    body: Result<Json<PlatformControlRequest>, json::Error<'_>>,
) -> Result<Json<ControlAccepted>, ApiError> {
    let request = parse_body(body)?;
    check_platform(request.platform_num)?;
    check_state(&request.state, &["up", "down"])?;
    info!(
        "Platform height request: task {} defect {} platform {} -> {}",
        request.task_id, request.defect_id, request.platform_num, request.state
    );
    let task = Task::new(request.task_id, request.defect_id, request.state)
        .with_target(request.platform_num.to_string());
    submit(state, task).map(Json)
}

/// Platform leveling control
///
/// **Endpoint:** `POST /stability/platformHorizontal/control`
///
/// `state` is `level` or `level_reset`, `platformNum` is 1 or 2.
#[post("/platformHorizontal/control", format = "json", data = "<body>")]
pub fn platform_horizontal_control(
    state: &State<ApiState>,
    body: Result<Json<PlatformControlRequest>, json::Error<'_>>,
) -> Result<Json<ControlAccepted>, ApiError> {
    let request = parse_body(body)?;
    check_platform(request.platform_num)?;
    check_state(&request.state, &["level", "level_reset"])?;
    info!(
        "Platform leveling request: task {} defect {} platform {} -> {}",
        request.task_id, request.defect_id, request.platform_num, request.state
    );
    let task = Task::new(request.task_id, request.defect_id, request.state)
        .with_target(request.platform_num.to_string());
    submit(state, task).map(Json)
}

/// Answers CORS preflight requests
#[options("/<_path..>")]
pub fn options(_path: PathBuf) -> Status {
    Status::NoContent
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        msg: "error".to_string(),
        error: format!("no route for {}", request.uri()),
    })
}

#[catch(422)]
pub fn unprocessable() -> Json<ErrorBody> {
    Json(ErrorBody {
        msg: "error".to_string(),
        error: "unprocessable request".to_string(),
    })
}

#[catch(default)]
pub fn default_catcher(status: Status, _request: &Request<'_>) -> status::Custom<Json<ErrorBody>> {
    api_error(status, status.reason().unwrap_or("request failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_fields() {
        let body = json!({"msg": "success", "cylinderPressure": 1.5, "platform1": "rising", "heater": "off"});
        assert_eq!(
            select_fields(body.clone(), "cylinderPressure, heater,unknown"),
            json!({"msg": "success", "cylinderPressure": 1.5, "heater": "off"})
        );
        assert_eq!(select_fields(body.clone(), " , "), body);
    }
}
