//! OpenBuilds head kinematics
//!
//! The head carries two tools on a shared vertical cam: turning the cam one
//! way lowers the first tool, the other way lowers the second. The Z axis
//! drives the cam angle, and each tool has its own rotary axis driven as an
//! extruder (`E`) selected with `T0`/`T1`.
//!
//! Planning is pure: [`Kinematics::plan_move`] turns a target pose into a
//! [`MovePlan`] and never touches the device. The driver executes the plan
//! step by step, committing Position State exactly where the plan says.

use super::commands::{select_tool, MoveCommand};
use pnpkit_core::{Location, Mover, PositionState, ToolIndex};
use pnpkit_settings::DriverSettings;

/// One step of a move plan
#[derive(Debug, Clone, PartialEq)]
pub enum MotionStep {
    /// Write this line and wait for its response
    Send(String),
    /// Block until the controller reports all queued motion complete
    AwaitMotion,
    /// Adopt this Position State
    Commit(PositionState),
}

/// Ordered steps that bring the machine to a requested pose
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovePlan {
    steps: Vec<MotionStep>,
}

impl MovePlan {
    /// Whether the plan does nothing
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[MotionStep] {
        &self.steps
    }

    /// Only the lines that will be written, in order
    pub fn commands(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                MotionStep::Send(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Position State after the whole plan has run
    pub fn final_position(&self) -> Option<PositionState> {
        self.steps.iter().rev().find_map(|step| match step {
            MotionStep::Commit(state) => Some(*state),
            _ => None,
        })
    }

    fn push(&mut self, step: MotionStep) {
        self.steps.push(step);
    }
}

impl IntoIterator for MovePlan {
    type Item = MotionStep;
    type IntoIter = std::vec::IntoIter<MotionStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

/// Rotations smaller than this are treated as already in place
const ANGLE_EPSILON: f64 = 1e-9;

/// Normalize an angle into `[0, 360)`
pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Signed rotation from `from` to `to` along the shorter arc, in `[-180, 180]`
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    let delta = normalize_angle(to) - normalize_angle(from);
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

/// Machine geometry and motion parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    /// Full-speed feed rate in mm/min
    pub feed_rate: f64,
    /// Cam radius in mm
    pub z_cam_radius: f64,
    /// Tool height at the neutral cam angle in mm
    pub z_offset: f64,
    /// Overshoot applied when moving toward negative X
    pub backlash_x: f64,
    /// Overshoot applied when moving toward positive Y
    pub backlash_y: f64,
    /// Feed rate of backlash corrections in mm/min
    pub backlash_speed: f64,
}

impl Kinematics {
    /// Build from driver settings
    pub fn from_settings(settings: &DriverSettings) -> Self {
        Self {
            feed_rate: settings.feed_rate_mm_per_minute,
            z_cam_radius: settings.z_cam_radius,
            z_offset: settings.z_offset,
            backlash_x: settings.backlash_x,
            backlash_y: settings.backlash_y,
            backlash_speed: settings.backlash_speed,
        }
    }

    /// Cam angle in degrees that puts `tool` at height `z`
    ///
    /// Heights below 0 are clamped to 0 and heights beyond the cam's reach
    /// saturate. The solved angle is never positive; the first tool sits on
    /// the mirrored side of the cam and gets its negation.
    pub fn cam_angle(&self, z: f64, tool: ToolIndex) -> f64 {
        let z = z.max(0.0);
        let ratio = ((z - self.z_offset) / self.z_cam_radius).clamp(-1.0, 1.0);
        let solved = ratio.asin().to_degrees().min(0.0);
        let angle = match tool {
            ToolIndex::First => -solved,
            ToolIndex::Second => solved,
        };
        // no negative zero on the wire or in state
        if angle == 0.0 {
            0.0
        } else {
            angle
        }
    }

    /// Height of `tool` when the cam sits at `angle` degrees
    pub fn height_for_cam_angle(&self, angle: f64, tool: ToolIndex) -> f64 {
        let lift = angle.to_radians().sin() * self.z_cam_radius;
        match tool {
            ToolIndex::First => self.z_offset - lift,
            ToolIndex::Second => self.z_offset + lift,
        }
    }

    /// Plan the moves that bring `mover` to `target`.
    ///
    /// `target` is in millimetres with head offsets already removed. A NaN
    /// component leaves that axis alone, and Z is ignored for non-tool
    /// movers. The plan is empty when nothing differs from `current`.
    pub fn plan_move(
        &self,
        current: &PositionState,
        mover: &Mover,
        target: &Location,
        speed: f64,
    ) -> MovePlan {
        let mut plan = MovePlan::default();
        let mut state = *current;
        let feed = self.feed_rate * speed;

        // Rotation runs alone; the firmware mistracks large E moves combined
        // with small linear ones.
        let rotary = mover.rotary_axis();
        if !target.rotation.is_nan() {
            let current_angle = state.tool_angle(rotary);
            let delta = shortest_delta(current_angle, target.rotation);
            if delta.abs() > ANGLE_EPSILON {
                let angle = current_angle + delta;
                plan.push(MotionStep::Send(select_tool(rotary)));
                plan.push(MotionStep::Send(
                    MoveCommand::new().axis('E', angle).with_feed(feed),
                ));
                plan.push(MotionStep::AwaitMotion);
                state.set_tool_angle(rotary, angle);
                plan.push(MotionStep::Commit(state));
            }
        }

        let mut primary = MoveCommand::new();
        let mut correction = MoveCommand::new();

        if !target.x.is_nan() && target.x != state.x {
            if target.x < state.x && self.backlash_x > 0.0 {
                primary.push_axis('X', target.x - self.backlash_x);
                correction.push_axis('X', target.x);
            } else {
                primary.push_axis('X', target.x);
            }
            state.x = target.x;
        }

        if !target.y.is_nan() && target.y != state.y {
            if target.y > state.y && self.backlash_y > 0.0 {
                primary.push_axis('Y', target.y + self.backlash_y);
                correction.push_axis('Y', target.y);
            } else {
                primary.push_axis('Y', target.y);
            }
            state.y = target.y;
        }

        if let Some(tool) = mover.tool_index() {
            if !target.z.is_nan() {
                let angle = self.cam_angle(target.z, tool);
                if angle != state.z_angle {
                    primary.push_axis('Z', angle / 10.0);
                    state.z_angle = angle;
                }
            }
        }

        if !primary.is_empty() {
            plan.push(MotionStep::Send(primary.with_feed(feed)));
            plan.push(MotionStep::Commit(state));
            plan.push(MotionStep::AwaitMotion);

            if !correction.is_empty() {
                plan.push(MotionStep::Send(correction.with_feed(self.backlash_speed)));
                plan.push(MotionStep::AwaitMotion);
            }
        }

        plan
    }
}
