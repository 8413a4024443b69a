//! Inbound message ownership

use gwsim::apps::{ClockApplication, InventoryApplication, Package};
use gwsim::Simulator;
use gwsim_core::Application;
use gwsim_tests::{gateway, mock_transport, EventLog, RecordingApp};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_wildcard_pattern_routes_to_owner_only() {
    let log = EventLog::new();
    let transport = mock_transport();
    let _simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![
            RecordingApp::new("clock", &["devices/+/clock/#"], &log).shared(),
            RecordingApp::new("inventory", &["devices/+/inventory/#"], &log).shared(),
        ],
    )
    .await
    .unwrap();
    log.take();

    assert_eq!(transport.inject("devices/ABC/clock/tick", "1").await, 1);
    assert_eq!(log.take(), vec!["clock <- devices/ABC/clock/tick"]);
}

#[tokio::test]
async fn test_overlapping_patterns_first_registered_wins() {
    let log = EventLog::new();
    let transport = mock_transport();
    let _simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![
            RecordingApp::new("first", &["{account-name}/{client-id}/#"], &log).shared(),
            RecordingApp::new("second", &["{account-name}/{client-id}/clock/GET"], &log)
                .shared(),
        ],
    )
    .await
    .unwrap();
    log.take();

    transport.inject("acme/gw-1/clock/GET", "").await;
    transport.inject("acme/gw-1/other/thing", "").await;
    assert_eq!(
        log.take(),
        vec![
            "first <- acme/gw-1/clock/GET",
            "first <- acme/gw-1/other/thing",
        ]
    );
}

#[tokio::test]
async fn test_unmatched_message_is_dropped_quietly() {
    let log = EventLog::new();
    let transport = mock_transport();
    let _simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![RecordingApp::new("clock", &["{account-name}/{client-id}/clock/#"], &log).shared()],
    )
    .await
    .unwrap();
    log.take();

    assert_eq!(transport.inject("acme/gw-2/clock/GET", "").await, 0);
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_subscriptions_restored_after_reconnect() {
    let log = EventLog::new();
    let transport = mock_transport();
    let _simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![RecordingApp::new("clock", &["{account-name}/{client-id}/clock/#"], &log).shared()],
    )
    .await
    .unwrap();

    transport.simulate_disconnect().await;
    assert_eq!(transport.inject("acme/gw-1/clock/GET", "").await, 0);
    transport.simulate_connect().await;
    log.take();

    assert_eq!(transport.inject("acme/gw-1/clock/GET", "").await, 1);
    assert_eq!(log.take(), vec!["clock <- acme/gw-1/clock/GET"]);
    assert_eq!(transport.subscriptions(), vec!["acme/gw-1/clock/#"]);
}

#[tokio::test]
async fn test_demo_applications_answer_requests() {
    let transport = mock_transport();
    let applications: Vec<Arc<dyn Application>> = vec![
        Arc::new(ClockApplication::new().unwrap()),
        Arc::new(
            InventoryApplication::new(vec![Package {
                name: "agent".to_string(),
                version: "1.0.0".to_string(),
            }])
            .unwrap(),
        ),
    ];
    let _simulator = Simulator::start(gateway(), transport.clone(), applications)
        .await
        .unwrap();
    transport.clear_published();

    transport.inject("acme/gw-1/clock/GET", "").await;
    transport.inject("acme/gw-1/inventory/GET", "").await;
    // A request nobody serves is logged, not fatal
    transport.inject("acme/gw-1/clock/RESET", "").await;

    let topics: Vec<String> = transport
        .published()
        .into_iter()
        .map(|m| m.topic)
        .collect();
    assert_eq!(
        topics,
        vec!["acme/gw-1/clock/REPLY", "acme/gw-1/inventory/REPLY"]
    );
}
