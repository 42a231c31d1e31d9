// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests of the HTTP notifier against a mocked edge system

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use stability_gateway::alarm::{AlarmSource, AlarmState};
use stability_gateway::callback::{
    AlarmNotice, CallbackCategory, HttpNotifier, Notifier, TaskNotice,
};
use stability_gateway::config::EdgeConfig;
use stability_gateway::plc::{ConnectionManager, ConnectionSettings, PlcMemory, SimulatedLink};
use stability_gateway::tasks::{Task, TaskPipeline};
use stability_gateway::utility::ShutdownSignal;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notice(category: CallbackCategory, platform_num: Option<u8>, state: &str) -> TaskNotice {
    TaskNotice {
        category,
        task_id: 11,
        defect_id: 22,
        platform_num,
        state: state.to_string(),
    }
}

#[tokio::test]
async fn test_task_notices_go_to_category_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stability/support/cback"))
        .and(body_json(
            json!({"taskId": 11, "defectId": 22, "state": "rigid support engaged"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stability/platformHorizontal/cback"))
        .and(body_json(
            json!({"taskId": 11, "defectId": 22, "platformNum": 2, "state": "platform 2 leveled"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(server.uri());
    notifier
        .notify_task(&notice(CallbackCategory::Support, None, "rigid support engaged"))
        .await;
    notifier
        .notify_task(&notice(
            CallbackCategory::PlatformLeveling,
            Some(2),
            "platform 2 leveled",
        ))
        .await;
}

#[tokio::test]
async fn test_alarm_notice_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stability/error/report"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(server.uri());
    let notice = AlarmNotice {
        alarm: AlarmSource::OilTemperature.describe(1),
        state: AlarmState::Error,
        timestamp: chrono::Utc::now().timestamp_millis(),
    };
    notifier.notify_alarm(&notice).await;

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["alarm"], "oil temperature high");
    assert_eq!(body["state"], "error");
    assert!(body["timestamp"].as_i64().unwrap() > 1_600_000_000_000);
}

#[tokio::test]
async fn test_failures_are_swallowed_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(server.uri());
    notifier
        .notify_task(&notice(CallbackCategory::PlatformHeight, Some(1), "error: boom"))
        .await;

    // Nothing listens on this port: the error is logged and dropped
    let unreachable = HttpNotifier::new("http://127.0.0.1:9").with_timeout_seconds(1);
    unreachable
        .notify_task(&notice(CallbackCategory::Support, None, "flexible support reset"))
        .await;
}

#[tokio::test]
async fn test_custom_paths_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/edge/height"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = EdgeConfig {
        base_url: server.uri(),
        platform_height_path: "/edge/height".to_string(),
        ..EdgeConfig::default()
    };
    let notifier = HttpNotifier::from_config(&config);
    notifier
        .notify_task(&notice(CallbackCategory::PlatformHeight, Some(1), "platform 1 raised"))
        .await;
}

#[tokio::test]
async fn test_raise_task_reaches_the_edge_system() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stability/platformHeight/cback"))
        .and(body_json(
            json!({"taskId": 1, "defectId": 9, "platformNum": 1, "state": "platform 1 raised"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = ConnectionSettings {
        settle_delay: Duration::ZERO,
        pulse_duration: Duration::from_millis(50),
        ..ConnectionSettings::default()
    };
    let plc = Arc::new(ConnectionManager::new(
        Box::new(SimulatedLink::new(PlcMemory::new())),
        settings,
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(server.uri()));
    let (pipeline, worker) = TaskPipeline::new(plc.clone(), notifier);
    let shutdown = ShutdownSignal::new();
    let handle = worker.spawn(shutdown.clone());

    pipeline
        .submit(Task::new(1, 9, "raise").with_target("1"))
        .unwrap();

    for _ in 0..100 {
        if !server.received_requests().await.unwrap_or_default().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown.trigger();
    handle.await.unwrap().unwrap();
    plc.shutdown().await;
}
