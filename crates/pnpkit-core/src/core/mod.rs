//! Driver capability interface
//!
//! The operations a host integration layer consumes from a motion driver.
//! Implementations serialize every device-touching operation so that only
//! one command is ever awaiting a response.

use crate::data::{ConnectionState, Location, Mover, PositionState, ToolIndex};
use crate::error::Result;
use async_trait::async_trait;

/// Motion driver operations
#[async_trait]
pub trait DriverTrait: Send + Sync {
    /// Driver name for logs and host display
    fn name(&self) -> &str;

    /// Current connection lifecycle state
    fn connection_state(&self) -> ConnectionState;

    /// Snapshot of the driver's last-commanded pose
    fn position(&self) -> PositionState;

    /// Pose of a mover derived from Position State and the mover's offsets.
    ///
    /// Performs no device I/O.
    fn location(&self, mover: &Mover) -> Location;

    /// Open the transport and run the startup handshake
    async fn connect(&self) -> Result<()>;

    /// Stop the reader and close the transport
    async fn disconnect(&self) -> Result<()>;

    /// Energize or release the machine
    async fn set_enabled(&self, enabled: bool) -> Result<()>;

    /// Run the homing sequence and refresh Position State
    async fn home(&self) -> Result<()>;

    /// Move a mover to a pose at a fraction of the configured feed rate
    async fn move_to(&self, mover: &Mover, location: Location, speed: f64) -> Result<()>;

    /// Switch a binary accessory by index
    async fn actuate(&self, index: usize, on: bool) -> Result<()>;

    /// Engage the vacuum on a tool
    async fn pick(&self, tool: ToolIndex) -> Result<()>;

    /// Release the vacuum on a tool
    async fn place(&self, tool: ToolIndex) -> Result<()>;
}
