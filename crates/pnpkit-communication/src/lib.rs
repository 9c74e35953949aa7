//! # pnpkit Communication
//!
//! Line transport, response reader and command dispatcher for pnpkit,
//! plus the OpenBuilds firmware driver built on top of them.

pub mod communication;
pub mod firmware;

pub use communication::{
    list_ports, CommandDispatcher, ConnectionParams, LineTransport, MockMode, MockTransport,
    ReaderHandle, ResponseChannel, ResponseReader, ResponseTimeout, SerialLineTransport,
    SerialPortInfo,
};

pub use firmware::openbuilds::{
    Accessory, Kinematics, MotionStep, MovePlan, OpenBuildsDriver, PositionReport, ResponseKind,
};
