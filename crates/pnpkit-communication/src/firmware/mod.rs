//! Firmware implementations
//!
//! Supported controllers:
//! - OpenBuilds: two-tool pick-and-place head on a Smoothieware board

pub mod openbuilds;

pub use openbuilds::OpenBuildsDriver;
