//! Heidenhain TNC emitters
//!
//! Each operation's path commands are routed to exactly one emitter. All
//! emitters append to the same output and share one modal machine state,
//! so operations must be emitted in job order.

use crate::ast::{CommandKind, PathCommand};

pub mod contour;
pub mod drill;
pub mod format;
pub mod linear;
pub mod output;
pub mod state;

pub use contour::{CompensationRequest, CutDirection, CutSide, RadiusMode};
pub use output::NcOutput;
pub use state::MachineState;

/// Everything an emitter needs to know about one operation
#[derive(Debug, Clone)]
pub struct OperationContext<'a> {
    pub label: &'a str,
    pub commands: &'a [PathCommand],
    /// Cutting feeds of the active tool, mm/min
    pub feed_xy: Option<f64>,
    pub feed_z: Option<f64>,
    pub tool_radius: f64,
    pub compensation: CompensationRequest,
    /// Factor from path feed units to program feed units (mm/s -> mm/min)
    pub feed_scale: f64,
    pub debug_comments: bool,
}

/// How an emitter finished an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Completed,
    /// A precondition failed; the reason is already in the output
    Aborted,
}

/// Emitter trait - implemented for each kind of operation
pub trait PathEmitter {
    /// Append the operation's lines, updating the shared state
    fn emit(
        &self,
        ctx: &OperationContext<'_>,
        state: &mut MachineState,
        out: &mut NcOutput,
    ) -> EmitOutcome;

    /// Emitter name for logs
    fn name(&self) -> &str;

    /// Whether this emitter sequences RL/RR cutter compensation
    fn supports_radius_compensation(&self) -> bool;
}

/// Available emitters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterType {
    Linear,  // Plain moves, used for dense 3D paths
    Contour, // Moves with radius compensation sequencing
    Drill,   // Grouped canned cycles
}

/// Commands that mark a path as drilling
const DRILL_CODES: [&str; 4] = ["G81", "G82", "G83", "G73"];

impl EmitterType {
    /// Get the emitter implementation
    pub fn get_emitter(&self) -> Box<dyn PathEmitter> {
        match self {
            EmitterType::Linear => Box::new(linear::LinearEmitter),
            EmitterType::Contour => Box::new(contour::ContourEmitter),
            EmitterType::Drill => Box::new(drill::DrillEmitter),
        }
    }

    /// Route a command list: any drilling cycle makes it a drill operation,
    /// long paths are treated as 3D surfacing, everything else as a contour.
    pub fn classify(commands: &[PathCommand], linear_threshold: usize) -> Self {
        let drilling = commands.iter().any(|c| match &c.kind {
            CommandKind::DrillCycle(_) => true,
            CommandKind::Other(name) => DRILL_CODES.contains(&name.as_str()),
            _ => false,
        });
        if drilling {
            EmitterType::Drill
        } else if commands.len() > linear_threshold {
            EmitterType::Linear
        } else {
            EmitterType::Contour
        }
    }
}
