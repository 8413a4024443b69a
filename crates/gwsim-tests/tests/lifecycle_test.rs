//! Connect/disconnect fan-out through the simulator

use gwsim::Simulator;
use gwsim_core::Transport;
use gwsim_tests::{births, gateway, mock_transport, EventLog, Fault, RecordingApp};
use gwsim_transport::{MockConfig, MockTransport};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[case::error(Fault::Error)]
#[case::panic(Fault::Panic)]
#[tokio::test]
async fn test_failing_application_does_not_stop_fan_out(#[case] fault: Fault) {
    let log = EventLog::new();
    let transport = mock_transport();

    let simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![
            RecordingApp::new("a1", &[], &log).shared(),
            RecordingApp::new("a2", &[], &log)
                .failing_on_connect(fault)
                .shared(),
            RecordingApp::new("a3", &[], &log).shared(),
        ],
    )
    .await
    .unwrap();

    assert!(simulator.is_connected());
    assert_eq!(log.take(), vec!["a1 connected", "a2 connected", "a3 connected"]);
    // The birth certificate module runs after the failing application
    assert_eq!(births(&transport).len(), 1);
}

#[tokio::test]
async fn test_exactly_once_per_cycle() {
    const CYCLES: usize = 5;
    let log = EventLog::new();
    let transport = mock_transport();

    let simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![
            RecordingApp::new("clock", &[], &log).shared(),
            RecordingApp::new("inventory", &[], &log).shared(),
        ],
    )
    .await
    .unwrap();
    transport.disconnect().await;

    for _ in 1..CYCLES {
        transport.connect().await;
        // Repeated transitions in the same direction are not events
        transport.simulate_connect().await;
        transport.disconnect().await;
        transport.simulate_disconnect().await;
    }

    assert!(!simulator.is_connected());
    for id in ["clock", "inventory"] {
        assert_eq!(log.count(&format!("{} connected", id)), CYCLES);
        assert_eq!(log.count(&format!("{} disconnected", id)), CYCLES);
    }
    assert_eq!(births(&transport).len(), CYCLES);
}

#[tokio::test]
async fn test_disconnect_order_matches_registration() {
    let log = EventLog::new();
    let transport = mock_transport();
    let _simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![
            RecordingApp::new("a1", &[], &log).shared(),
            RecordingApp::new("a2", &[], &log).shared(),
        ],
    )
    .await
    .unwrap();
    log.take();

    transport.simulate_disconnect().await;
    assert_eq!(log.take(), vec!["a1 disconnected", "a2 disconnected"]);
}

#[tokio::test]
async fn test_refused_connect_then_retry() {
    let log = EventLog::new();
    let transport = Arc::new(MockTransport::new(
        &gateway(),
        &MockConfig {
            accept_connections: false,
        },
    ));

    let simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![RecordingApp::new("clock", &[], &log).shared()],
    )
    .await
    .unwrap();
    assert!(!simulator.is_connected());
    assert!(log.entries().is_empty());
    assert!(births(&transport).is_empty());

    transport.set_accept_connections(true);
    transport.connect().await;
    assert!(simulator.is_connected());
    assert_eq!(log.entries(), vec!["clock connected"]);
    assert_eq!(births(&transport).len(), 1);
    assert_eq!(transport.connect_attempts(), 2);
}

#[tokio::test]
async fn test_events_after_drop_are_ignored() {
    let log = EventLog::new();
    let transport = mock_transport();
    let simulator = Simulator::start(
        gateway(),
        transport.clone(),
        vec![RecordingApp::new("clock", &[], &log).shared()],
    )
    .await
    .unwrap();
    drop(simulator);
    log.take();

    transport.disconnect().await;
    transport.connect().await;
    assert!(transport.is_connected());
    assert!(log.entries().is_empty());
}
