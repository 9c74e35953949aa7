//! OpenBuilds protocol commands
//!
//! Fixed command lines and a builder for `G0` move lines. Numbers are
//! always written with two decimals and a `.` separator.

use pnpkit_core::ToolIndex;

/// Clear a triggered limit state
pub const CLEAR_HALT: &str = "M999";
/// Release motor torque
pub const DISABLE_MOTORS: &str = "M84";
/// Query position
pub const QUERY_POSITION: &str = "M114";
/// Block until all queued motion has finished
pub const WAIT_FOR_MOTION: &str = "M400";
/// Millimetre units
pub const METRIC_UNITS: &str = "G21";
/// Absolute positioning
pub const ABSOLUTE_POSITIONING: &str = "G90";
/// Absolute extrusion mode
pub const ABSOLUTE_EXTRUSION: &str = "M82";

/// Coordinate-mode setup issued after every handshake
pub const SETUP_SEQUENCE: [&str; 3] = [METRIC_UNITS, ABSOLUTE_POSITIONING, ABSOLUTE_EXTRUSION];

/// Call the released Z cam its zero
pub const HOME_Z_ZERO: &str = "G92 Z0";
/// Turn the head off the Z microswitch
pub const HOME_Z_BACK_OFF: &str = "G0 Z-4.5";
/// Seek the Z home switch
pub const HOME_Z_SEEK: &str = "G28 Z0";
/// Correct for the switch's rotational offset
pub const HOME_Z_CORRECT: &str = "G92 Z-0.5";
/// Seek the X and Y home switches
pub const HOME_XY_SEEK: &str = "G28 X0 Y0";
/// Zero the active tool's rotary axis
pub const ZERO_ROTATION: &str = "G92 E0";

/// Binary accessories on the head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessory {
    /// Down-facing camera light
    DownLight,
    /// Vacuum on the first tool
    Tool0Vacuum,
    /// Vacuum on the second tool
    Tool1Vacuum,
    /// Up-facing camera light
    UpLight,
}

impl Accessory {
    /// Map a host actuator index onto an accessory
    pub fn from_actuator_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Accessory::DownLight),
            1 => Some(Accessory::Tool0Vacuum),
            2 => Some(Accessory::Tool1Vacuum),
            3 => Some(Accessory::UpLight),
            _ => None,
        }
    }

    /// The vacuum serving a tool
    pub fn vacuum(tool: ToolIndex) -> Self {
        match tool {
            ToolIndex::First => Accessory::Tool0Vacuum,
            ToolIndex::Second => Accessory::Tool1Vacuum,
        }
    }

    /// Command line switching this accessory
    pub fn command(self, on: bool) -> &'static str {
        match (self, on) {
            (Accessory::Tool0Vacuum, true) => "M800",
            (Accessory::Tool0Vacuum, false) => "M801",
            (Accessory::Tool1Vacuum, true) => "M802",
            (Accessory::Tool1Vacuum, false) => "M803",
            (Accessory::DownLight, true) => "M804",
            (Accessory::DownLight, false) => "M805",
            (Accessory::UpLight, true) => "M806",
            (Accessory::UpLight, false) => "M807",
        }
    }
}

/// Tool-select line
pub fn select_tool(tool: ToolIndex) -> String {
    tool.to_string()
}

/// Format a protocol number: two decimals, no negative zero
pub fn format_number(value: f64) -> String {
    let text = format!("{:.2}", value);
    match text.as_str() {
        "-0.00" => "0.00".to_string(),
        _ => text,
    }
}

/// Builder for a `G0` line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveCommand {
    words: Vec<(char, f64)>,
}

impl MoveCommand {
    /// Start an empty move
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis word
    pub fn axis(mut self, letter: char, value: f64) -> Self {
        self.words.push((letter, value));
        self
    }

    /// Append an axis word in place
    pub fn push_axis(&mut self, letter: char, value: f64) {
        self.words.push((letter, value));
    }

    /// Whether any axis word was added
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Render with a trailing feed rate
    pub fn with_feed(&self, feed: f64) -> String {
        let mut line = String::from("G0");
        for (letter, value) in &self.words {
            line.push(' ');
            line.push(*letter);
            line.push_str(&format_number(*value));
        }
        line.push_str(" F");
        line.push_str(&format_number(feed));
        line
    }
}
