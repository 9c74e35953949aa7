mod connection;
mod motion;
mod operations;

use pnpkit_communication::{MockTransport, OpenBuildsDriver};
use pnpkit_core::{ConnectionState, DriverTrait};
use pnpkit_settings::DriverSettings;
use std::sync::Arc;
use std::time::Duration;

/// Settings with short protocol timeouts
pub fn fast_settings() -> DriverSettings {
    DriverSettings {
        connect_timeout_ms: 300,
        flush_timeout_ms: 30,
        command_timeout_ms: 500,
        reader_join_timeout_ms: 300,
        motor_settle_ms: 0,
        ..DriverSettings::default()
    }
}

pub fn driver_with(transport: &Arc<MockTransport>, settings: DriverSettings) -> OpenBuildsDriver {
    OpenBuildsDriver::new(settings, transport.clone(), Duration::from_millis(10))
}

pub fn driver(transport: &Arc<MockTransport>) -> OpenBuildsDriver {
    driver_with(transport, fast_settings())
}

/// A connected driver with the handshake's writes cleared
pub async fn connected(transport: &Arc<MockTransport>) -> OpenBuildsDriver {
    let driver = driver(transport);
    driver.connect().await.unwrap();
    assert_eq!(driver.connection_state(), ConnectionState::Connected);
    transport.clear_writes();
    driver
}
