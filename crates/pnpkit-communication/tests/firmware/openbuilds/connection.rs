//! Connect/disconnect lifecycle

use super::{connected, driver, driver_with, fast_settings};
use pnpkit_communication::{LineTransport, MockMode, MockTransport};
use pnpkit_core::{ConnectionError, ConnectionState, ControllerError, DriverTrait, Error};
use pnpkit_settings::DriverSettings;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_connect_after_banner() {
    let transport = Arc::new(MockTransport::new().with_banner(["Smoothie", "ok", "Build version: edge"]));
    let driver = driver(&transport);

    driver.connect().await.unwrap();

    assert_eq!(driver.connection_state(), ConnectionState::Connected);
    assert_eq!(
        transport.writes(),
        vec![
            "M114", "M84", "M801", "M803", "M805", "M807", "G21", "G90", "M82", "T0", "M114",
            "T1", "M114", "T0",
        ]
    );

    driver.disconnect().await.unwrap();
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
    assert!(!transport.is_open());
}

#[tokio::test]
async fn test_connect_without_position_report_fails() {
    let transport = Arc::new(MockTransport::with_mode(MockMode::AckOnly));
    let driver = driver(&transport);

    let err = driver.connect().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ConnectionFailed { .. })
    ));
    assert!(err.to_string().contains("baud"));
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
    assert!(!transport.is_open());
}

#[tokio::test]
async fn test_connect_to_silent_controller_fails_within_timeout() {
    let transport = Arc::new(MockTransport::silent());
    let settings = DriverSettings {
        connect_timeout_ms: 1000,
        flush_timeout_ms: 50,
        ..fast_settings()
    };
    let driver = driver_with(&transport, settings);

    let started = Instant::now();
    let err = driver.connect().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ConnectionFailed { .. })
    ));
    assert!(err.to_string().contains("1000ms"));
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1400), "took {:?}", elapsed);
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
    assert_eq!(transport.writes(), vec!["M114"]);
}

#[tokio::test]
async fn test_refresh_reads_scripted_report() {
    let transport = Arc::new(MockTransport::new());
    transport.set_reply("M114", ["ok X:10.00 Y:20.00 Z:5.00 E:90.00"]);
    let driver = driver(&transport);

    driver.connect().await.unwrap();

    let position = driver.position();
    assert_eq!(position.x, 10.0);
    assert_eq!(position.y, 20.0);
    assert_eq!(position.z_angle, 50.0);
    assert_eq!(position.tool_angle_0, 90.0);
}

#[tokio::test]
async fn test_refresh_reads_each_tool_angle() {
    let transport = Arc::new(MockTransport::new().with_machine_position(1.5, 2.5, 0.5, 45.0, -30.0));
    let driver = driver(&transport);

    driver.connect().await.unwrap();

    let position = driver.position();
    assert_eq!(position.x, 1.5);
    assert_eq!(position.y, 2.5);
    assert_eq!(position.z_angle, 5.0);
    assert_eq!(position.tool_angle_0, 45.0);
    assert_eq!(position.tool_angle_1, -30.0);
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;

    assert!(matches!(
        driver.connect().await,
        Err(Error::Controller(ControllerError::AlreadyConnected))
    ));
    assert_eq!(driver.connection_state(), ConnectionState::Connected);
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn test_disconnect_is_bounded_when_reader_stalls() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    transport.set_mode(MockMode::Stall(Duration::from_secs(5)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    driver.disconnect().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let transport = Arc::new(MockTransport::new().with_banner(["Smoothie"]));
    let driver = connected(&transport).await;

    driver.disconnect().await.unwrap();
    driver.connect().await.unwrap();

    assert_eq!(driver.connection_state(), ConnectionState::Connected);
    assert_eq!(transport.writes().first().map(String::as_str), Some("M114"));
}

#[tokio::test]
async fn test_reconnect_waits_for_stalled_reader() {
    let transport = Arc::new(MockTransport::new().with_machine_position(3.0, 4.0, 0.0, 0.0, 0.0));
    let settings = DriverSettings {
        connect_timeout_ms: 1000,
        reader_join_timeout_ms: 100,
        ..fast_settings()
    };
    let driver = driver_with(&transport, settings);
    driver.connect().await.unwrap();

    transport.set_mode(MockMode::Stall(Duration::from_millis(500)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    driver.disconnect().await.unwrap();
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);

    transport.set_mode(MockMode::Controller);
    transport.clear_writes();
    driver.connect().await.unwrap();

    assert_eq!(driver.connection_state(), ConnectionState::Connected);
    assert_eq!(transport.writes().first().map(String::as_str), Some("M114"));
    assert_eq!(driver.position().x, 3.0);
    assert_eq!(driver.position().y, 4.0);
}

#[tokio::test]
async fn test_connect_fails_while_previous_reader_is_blocked() {
    let transport = Arc::new(MockTransport::new());
    let settings = DriverSettings {
        connect_timeout_ms: 300,
        reader_join_timeout_ms: 100,
        ..fast_settings()
    };
    let driver = driver_with(&transport, settings);
    driver.connect().await.unwrap();

    transport.set_mode(MockMode::Stall(Duration::from_millis(900)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    driver.disconnect().await.unwrap();
    transport.clear_writes();

    let err = driver.connect().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ConnectionFailed { .. })
    ));
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
    assert!(transport.writes().is_empty());
    assert!(!transport.is_open());

    transport.set_mode(MockMode::Controller);
    tokio::time::sleep(Duration::from_millis(600)).await;
    driver.connect().await.unwrap();
    assert_eq!(driver.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_transport_fault_surfaces_on_next_command() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    transport.fail_reads("device unplugged");

    let started = Instant::now();
    let err = driver.actuate(0, true).await.unwrap_err();
    assert!(err.is_transport_fault());
    assert!(driver.home().await.unwrap_err().is_transport_fault());
    assert!(started.elapsed() < Duration::from_secs(2));

    driver.disconnect().await.unwrap();
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_enable_connects_on_demand() {
    let transport = Arc::new(MockTransport::new());
    let driver = driver(&transport);

    driver.set_enabled(true).await.unwrap();

    assert_eq!(driver.connection_state(), ConnectionState::Connected);
    let writes = transport.writes();
    assert_eq!(&writes[writes.len() - 4..], ["M999", "M801", "M803", "M804"]);
}

#[tokio::test]
async fn test_disable_disconnects_unless_kept_alive() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;

    driver.set_enabled(false).await.unwrap();
    assert_eq!(transport.writes(), vec!["M84", "M801", "M803", "M805", "M807"]);
    assert_eq!(driver.connection_state(), ConnectionState::Disconnected);

    let transport = Arc::new(MockTransport::new());
    let settings = DriverSettings {
        connection_keep_alive: true,
        ..fast_settings()
    };
    let driver = driver_with(&transport, settings);
    driver.connect().await.unwrap();

    driver.set_enabled(false).await.unwrap();
    assert_eq!(driver.connection_state(), ConnectionState::Connected);
}
