//! # pnpkit Core
//!
//! Core types, traits, and utilities for pnpkit.
//! Provides the driver capability interface, the pose and position data
//! model, and the error taxonomy shared by every crate.

pub mod core;
pub mod data;
pub mod error;

pub use core::DriverTrait;

pub use data::{
    ConnectionState, Location, Mover, MoverKind, PositionState, ToolIndex, Units,
};

pub use error::{ConnectionError, ControllerError, Error, Result};
