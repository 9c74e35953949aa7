//! OpenBuilds (Smoothieware) response parser
//!
//! Classifies response lines and extracts axis values from `M114`
//! position reports.

/// Marker that identifies a position report
pub const POSITION_MARKER: &str = "X:";

/// Classification of one response line
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseKind {
    /// Acknowledgement (`ok`, possibly followed by data)
    Ack,
    /// Error report with message
    Error(String),
    /// Position report without an acknowledgement prefix
    PositionReport,
    /// Anything else (banners, echo, telemetry)
    Info,
}

impl ResponseKind {
    /// Classify a trimmed response line
    ///
    /// An `ok` line that also carries a position is classified as [`Ack`];
    /// use [`is_position_report`] to test for position data independently.
    ///
    /// [`Ack`]: ResponseKind::Ack
    pub fn classify(line: &str) -> Self {
        let line = line.trim();

        if line.starts_with("ok") {
            return ResponseKind::Ack;
        }

        for prefix in ["error:", "Error:", "error", "Error"] {
            if let Some(rest) = line.strip_prefix(prefix) {
                return ResponseKind::Error(rest.trim().to_string());
            }
        }

        if is_position_report(line) {
            return ResponseKind::PositionReport;
        }

        ResponseKind::Info
    }
}

/// Whether a line carries a position report
pub fn is_position_report(line: &str) -> bool {
    line.contains(POSITION_MARKER)
}

/// Axis values from a position report
///
/// Each axis is optional; tokens that are missing or fail to parse leave
/// the field unset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionReport {
    /// X in millimetres
    pub x: Option<f64>,
    /// Y in millimetres
    pub y: Option<f64>,
    /// Z as reported, one tenth of the cam angle in degrees
    pub z: Option<f64>,
    /// E of the active tool, its rotation in degrees
    pub e: Option<f64>,
}

impl PositionReport {
    /// Parse a line such as `ok C: X:10.0000 Y:20.0000 Z:5.0000 E:90.0000`
    ///
    /// Returns `None` if the line is not a position report at all.
    pub fn parse(line: &str) -> Option<Self> {
        if !is_position_report(line) {
            return None;
        }

        let mut report = PositionReport::default();
        for token in line.split_whitespace() {
            let Some((axis, value)) = token.split_once(':') else {
                continue;
            };
            let Ok(value) = value.parse::<f64>() else {
                continue;
            };
            match axis {
                "X" => report.x = Some(value),
                "Y" => report.y = Some(value),
                "Z" => report.z = Some(value),
                "E" => report.e = Some(value),
                _ => {}
            }
        }
        Some(report)
    }
}
