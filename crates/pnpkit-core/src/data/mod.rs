//! Data models for poses, movers, and driver state
//!
//! This module provides:
//! - Location with rotation and units, as requested by the host
//! - Mover identity (which tool, if any, a move request targets)
//! - Position State: the driver's belief about the current machine pose
//! - Connection State for the lifecycle manager

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine coordinate units (millimeters or inches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    /// Millimeters (metric)
    #[default]
    MM,
    /// Inches (imperial)
    INCH,
}

impl Units {
    /// Convert a value from one unit to another
    pub fn convert(value: f64, from: Units, to: Units) -> f64 {
        match (from, to) {
            (Units::MM, Units::INCH) => value / 25.4,
            (Units::INCH, Units::MM) => value * 25.4,
            _ => value,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::MM => write!(f, "mm"),
            Units::INCH => write!(f, "in"),
        }
    }
}

/// A pose as seen by the host: Cartesian position plus rotation in degrees
///
/// A NaN component means "leave this axis where it is" when used as a move
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis (tool height) position
    pub z: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Linear unit of x, y and z
    pub units: Units,
}

impl Location {
    /// Create a millimeter location
    pub fn new(x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self::with_units(Units::MM, x, y, z, rotation)
    }

    /// Create a location in the given units
    pub fn with_units(units: Units, x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self {
            x,
            y,
            z,
            rotation,
            units,
        }
    }

    /// Convert the linear axes to another unit; rotation is unit-free
    pub fn convert_to(&self, units: Units) -> Self {
        Self {
            x: Units::convert(self.x, self.units, units),
            y: Units::convert(self.y, self.units, units),
            z: Units::convert(self.z, self.units, units),
            rotation: self.rotation,
            units,
        }
    }

    /// Add another location (component-wise, in this location's units)
    pub fn add(&self, other: &Location) -> Self {
        let other = other.convert_to(self.units);
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            rotation: self.rotation + other.rotation,
            units: self.units,
        }
    }

    /// Subtract another location (component-wise, in this location's units)
    pub fn subtract(&self, other: &Location) -> Self {
        let other = other.convert_to(self.units);
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            rotation: self.rotation - other.rotation,
            units: self.units,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.3} Y:{:.3} Z:{:.3} R:{:.3} ({})",
            self.x, self.y, self.z, self.rotation, self.units
        )
    }
}

/// One of the two rotary tool positions on the head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolIndex {
    /// Tool 0, selected with `T0`
    First,
    /// Tool 1, selected with `T1`
    Second,
}

impl ToolIndex {
    /// Protocol tool number
    pub fn index(self) -> usize {
        match self {
            ToolIndex::First => 0,
            ToolIndex::Second => 1,
        }
    }

    /// Look up a tool by protocol number
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ToolIndex::First),
            1 => Some(ToolIndex::Second),
            _ => None,
        }
    }
}

impl fmt::Display for ToolIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.index())
    }
}

/// What a mover carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoverKind {
    /// A tool holder; moves vertically and rotates its own rotary axis
    Tool(ToolIndex),
    /// A non-tool reference point (camera, actuator); never moves vertically
    Fixed,
}

/// A logical axis-carrying entity that can be the target of a move request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    /// Display name
    pub name: String,
    /// Tool or fixed mover
    pub kind: MoverKind,
    /// Static offset of this mover from the head origin
    pub head_offsets: Location,
}

impl Mover {
    /// Create a tool-carrying mover
    pub fn tool(name: impl Into<String>, tool: ToolIndex, head_offsets: Location) -> Self {
        Self {
            name: name.into(),
            kind: MoverKind::Tool(tool),
            head_offsets,
        }
    }

    /// Create a non-tool mover
    pub fn fixed(name: impl Into<String>, head_offsets: Location) -> Self {
        Self {
            name: name.into(),
            kind: MoverKind::Fixed,
            head_offsets,
        }
    }

    /// The tool this mover carries, if any
    pub fn tool_index(&self) -> Option<ToolIndex> {
        match self.kind {
            MoverKind::Tool(tool) => Some(tool),
            MoverKind::Fixed => None,
        }
    }

    /// Rotary axis that governs this mover's rotation
    ///
    /// Non-tool movers follow tool 0.
    pub fn rotary_axis(&self) -> ToolIndex {
        self.tool_index().unwrap_or(ToolIndex::First)
    }
}

/// The driver's belief about the current machine pose
///
/// Holds the last-commanded values, not necessarily machine-confirmed ones.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionState {
    /// X in mm
    pub x: f64,
    /// Y in mm
    pub y: f64,
    /// Vertical cam angle in degrees
    pub z_angle: f64,
    /// Accumulated angle of tool 0 in degrees
    pub tool_angle_0: f64,
    /// Accumulated angle of tool 1 in degrees
    pub tool_angle_1: f64,
}

impl PositionState {
    /// Accumulated angle of the given tool
    pub fn tool_angle(&self, tool: ToolIndex) -> f64 {
        match tool {
            ToolIndex::First => self.tool_angle_0,
            ToolIndex::Second => self.tool_angle_1,
        }
    }

    /// Record a new accumulated angle for the given tool
    pub fn set_tool_angle(&mut self, tool: ToolIndex, angle: f64) {
        match tool {
            ToolIndex::First => self.tool_angle_0 = angle,
            ToolIndex::Second => self.tool_angle_1 = angle,
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.2} Y:{:.2} Za:{:.2} C0:{:.2} C1:{:.2}",
            self.x, self.y, self.z_angle, self.tool_angle_0, self.tool_angle_1
        )
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport open
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Handshake observed a position report
    Connected,
    /// Shutdown in progress
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_unit_conversion() {
        let loc = Location::with_units(Units::INCH, 1.0, 2.0, 0.5, 90.0);
        let mm = loc.convert_to(Units::MM);
        assert!((mm.x - 25.4).abs() < 1e-9);
        assert!((mm.y - 50.8).abs() < 1e-9);
        assert!((mm.z - 12.7).abs() < 1e-9);
        assert_eq!(mm.rotation, 90.0);
        assert_eq!(mm.units, Units::MM);
    }

    #[test]
    fn test_location_offsets_cancel() {
        let offsets = Location::new(-20.0, 5.0, 0.0, 0.0);
        let target = Location::new(100.0, 50.0, 10.0, 45.0);
        let back = target.subtract(&offsets).add(&offsets);
        assert_eq!(back, target);
    }

    #[test]
    fn test_tool_index_round_trip() {
        assert_eq!(ToolIndex::from_index(0), Some(ToolIndex::First));
        assert_eq!(ToolIndex::from_index(1), Some(ToolIndex::Second));
        assert_eq!(ToolIndex::from_index(2), None);
        assert_eq!(ToolIndex::Second.to_string(), "T1");
    }

    #[test]
    fn test_mover_rotary_axis() {
        let camera = Mover::fixed("camera", Location::default());
        assert_eq!(camera.tool_index(), None);
        assert_eq!(camera.rotary_axis(), ToolIndex::First);

        let n2 = Mover::tool("N2", ToolIndex::Second, Location::default());
        assert_eq!(n2.rotary_axis(), ToolIndex::Second);
    }

    #[test]
    fn test_position_state_tool_angles() {
        let mut state = PositionState::default();
        state.set_tool_angle(ToolIndex::Second, 370.0);
        assert_eq!(state.tool_angle(ToolIndex::Second), 370.0);
        assert_eq!(state.tool_angle(ToolIndex::First), 0.0);
    }

    #[test]
    fn test_location_serializes() {
        let json = serde_json::to_string(&Location::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rotation, 4.0);
    }
}
