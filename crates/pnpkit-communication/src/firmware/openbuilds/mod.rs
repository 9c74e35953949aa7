//! OpenBuilds pick-and-place head on Smoothieware
//!
//! - [`commands`]: protocol lines and the `G0` builder
//! - [`response_parser`]: response classification and `M114` parsing
//! - [`kinematics`]: cam, backlash and rotation planning
//! - [`controller`]: the [`OpenBuildsDriver`]

pub mod commands;
pub mod controller;
pub mod kinematics;
pub mod response_parser;

pub use commands::{Accessory, MoveCommand};
pub use controller::OpenBuildsDriver;
pub use kinematics::{normalize_angle, shortest_delta, Kinematics, MotionStep, MovePlan};
pub use response_parser::{is_position_report, PositionReport, ResponseKind};
