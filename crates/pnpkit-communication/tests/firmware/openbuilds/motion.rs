//! Pose requests through the driver

use super::connected;
use pnpkit_communication::{MockMode, MockTransport};
use pnpkit_core::{DriverTrait, Location, Mover, ToolIndex, Units};
use std::sync::Arc;

const NAN: f64 = f64::NAN;

fn nozzle(tool: ToolIndex) -> Mover {
    Mover::tool(format!("N{}", tool.index() + 1), tool, Location::default())
}

#[tokio::test]
async fn test_repeated_pose_sends_nothing() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let mover = nozzle(ToolIndex::First);
    let target = Location::new(40.0, 25.0, 10.0, 45.0);

    driver.move_to(&mover, target, 1.0).await.unwrap();
    assert!(!transport.writes().is_empty());

    transport.clear_writes();
    driver.move_to(&mover, target, 1.0).await.unwrap();
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn test_x_backlash_sequence() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let mover = nozzle(ToolIndex::First);

    driver
        .move_to(&mover, Location::new(50.0, NAN, NAN, NAN), 1.0)
        .await
        .unwrap();
    assert_eq!(transport.writes(), vec!["G0 X50.00 F5000.00", "M400"]);

    transport.clear_writes();
    driver
        .move_to(&mover, Location::new(20.0, NAN, NAN, NAN), 1.0)
        .await
        .unwrap();
    assert_eq!(
        transport.writes(),
        vec!["G0 X18.00 F5000.00", "M400", "G0 X20.00 F2000.00", "M400"]
    );
    assert_eq!(driver.position().x, 20.0);
}

#[tokio::test]
async fn test_y_backlash_sequence() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let mover = nozzle(ToolIndex::First);

    driver
        .move_to(&mover, Location::new(NAN, 30.0, NAN, NAN), 0.5)
        .await
        .unwrap();
    assert_eq!(
        transport.writes(),
        vec!["G0 Y32.00 F2500.00", "M400", "G0 Y30.00 F2000.00", "M400"]
    );
    assert_eq!(driver.position().y, 30.0);
}

#[tokio::test]
async fn test_rotation_selects_tool_and_runs_alone() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let mover = nozzle(ToolIndex::Second);

    driver
        .move_to(&mover, Location::new(10.0, NAN, NAN, 270.0), 1.0)
        .await
        .unwrap();
    assert_eq!(
        transport.writes(),
        vec![
            "T1",
            "G0 E-90.00 F5000.00",
            "M400",
            "G0 X10.00 F5000.00",
            "M400",
        ]
    );

    let position = driver.position();
    assert_eq!(position.tool_angle_1, -90.0);
    assert_eq!(position.tool_angle_0, 0.0);
    assert_eq!(driver.location(&mover).rotation, 270.0);
}

#[tokio::test]
async fn test_head_offsets_and_units() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let camera = Mover::fixed("camera", Location::new(5.0, -5.0, 0.0, 0.0));

    driver
        .move_to(
            &camera,
            Location::with_units(Units::INCH, 1.0, NAN, NAN, NAN),
            1.0,
        )
        .await
        .unwrap();
    // 25.4mm minus the 5mm offset
    assert_eq!(transport.writes(), vec!["G0 X20.40 F5000.00", "M400"]);

    let location = driver.location(&camera);
    assert!((location.x - 25.4).abs() < 1e-9);
    assert_eq!(location.units, Units::MM);
}

#[tokio::test]
async fn test_fixed_mover_never_moves_z() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let camera = Mover::fixed("camera", Location::default());

    driver
        .move_to(&camera, Location::new(NAN, NAN, 3.0, NAN), 1.0)
        .await
        .unwrap();
    assert!(transport.writes().is_empty());
    assert_eq!(driver.location(&camera).z, 0.0);
}

#[tokio::test]
async fn test_tool_height_round_trips() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let first = nozzle(ToolIndex::First);
    let second = nozzle(ToolIndex::Second);

    driver
        .move_to(&first, Location::new(NAN, NAN, 10.0, NAN), 1.0)
        .await
        .unwrap();
    assert!(driver.position().z_angle > 0.0);
    assert!((driver.location(&first).z - 10.0).abs() < 1e-9);

    driver
        .move_to(&second, Location::new(NAN, NAN, 10.0, NAN), 1.0)
        .await
        .unwrap();
    assert!(driver.position().z_angle < 0.0);
    assert!((driver.location(&second).z - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_timeout_leaves_position_unchanged() {
    let transport = Arc::new(MockTransport::new());
    let driver = connected(&transport).await;
    let mover = nozzle(ToolIndex::First);
    let before = driver.position();
    transport.set_mode(MockMode::Silent);

    let err = driver
        .move_to(&mover, Location::new(100.0, NAN, NAN, NAN), 1.0)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("G0 X100.00"));
    assert_eq!(driver.position(), before);
}
