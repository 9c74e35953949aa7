//! Homing, accessories and vacuum

use super::connected;
use pnpkit_communication::MockTransport;
use pnpkit_core::{ControllerError, DriverTrait, Error, PositionState, ToolIndex};
use std::sync::Arc;

#[tokio::test]
async fn test_actuators_map_to_accessories() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;

    driver.actuate(0, true).await.unwrap();
    driver.actuate(1, true).await.unwrap();
    driver.actuate(2, false).await.unwrap();
    driver.actuate(3, false).await.unwrap();
    assert_eq!(transport.writes(), vec!["M804", "M800", "M803", "M807"]);
}

#[tokio::test]
async fn test_unknown_actuator_is_rejected() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;

    assert!(matches!(
        driver.actuate(4, true).await,
        Err(Error::Controller(ControllerError::InvalidActuator { index: 4 }))
    ));
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn test_pick_and_place_track_each_tool() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;

    driver.pick(ToolIndex::Second).await.unwrap();
    assert!(driver.is_picked(ToolIndex::Second));
    assert!(!driver.is_picked(ToolIndex::First));

    driver.pick(ToolIndex::First).await.unwrap();
    driver.place(ToolIndex::Second).await.unwrap();
    assert!(driver.is_picked(ToolIndex::First));
    assert!(!driver.is_picked(ToolIndex::Second));

    assert_eq!(transport.writes(), vec!["M802", "M800", "M803"]);
}

#[tokio::test]
async fn test_home_sequence() {
    let transport = Arc::new(MockTransport::new().with_machine_position(120.0, 80.0, 1.2, 400.0, 15.0));
    let driver = connected(&transport).await;
    assert_eq!(driver.position().x, 120.0);

    driver.home().await.unwrap();

    assert_eq!(
        transport.writes(),
        vec![
            "M999",
            "M84",
            "G92 Z0",
            "G0 Z-4.5",
            "M84",
            "G28 Z0",
            "G92 Z-0.5",
            "G28 X0 Y0",
            "T1",
            "G92 E0",
            "T0",
            "G92 E0",
            "T0",
            "M114",
            "T1",
            "M114",
            "T0",
        ]
    );
    assert_eq!(
        driver.position(),
        PositionState {
            x: 0.0,
            y: 0.0,
            z_angle: -5.0,
            tool_angle_0: 0.0,
            tool_angle_1: 0.0,
        }
    );
}

#[tokio::test]
async fn test_driver_as_trait_object() {
    let transport = Arc::new(MockTransport::new());
    let driver: Arc<dyn DriverTrait> = Arc::new(connected(&transport).await);

    assert_eq!(driver.name(), "OpenBuilds");
    driver.actuate(0, false).await.unwrap();
    driver.disconnect().await.unwrap();
    assert!(driver.actuate(0, true).await.is_err());
}
