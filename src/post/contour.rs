//! Contour emitter with cutter radius compensation sequencing
//!
//! The control only accepts RL/RR on a straight move, so a contour needs a
//! straight lead-in before the first cutting move after the plunge. The
//! sequence is:
//!
//! ```text
//! L  X..  Y..  R0  F9999     approach, explicitly uncompensated
//! L  Z-1.000  F200           plunge
//! RND R3.5                   rounding radius, declared once
//! L  X..  Y..  RL  F600      entry move, switches compensation on
//! L  X..  Y..                contour continues, RL stays modal
//! ```

use tracing::{debug, warn};

use super::linear::{emit_arc, emit_xy_move, emit_z_move};
use super::output::{CompWord, Feed, NcOutput};
use super::state::MachineState;
use super::{EmitOutcome, OperationContext, PathEmitter};
use crate::ast::{CommandKind, Params, PathCommand};

/// Error pair written when RL/RR is requested without a lead-in
pub const LEAD_IN_ERROR: [&str; 2] = ["(ERROR: RL/RR requires Lead-In)", "(Contour aborted)"];

/// Which side of the programmed path the cutter runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutSide {
    Left,
    Right,
    Inside,
    Outside,
}

impl CutSide {
    /// Accepts the spellings CAM systems use; anything else is `None`
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "left" | "l" | "g41" | "rl" => Some(CutSide::Left),
            "right" | "r" | "g42" | "rr" => Some(CutSide::Right),
            "inside" | "inner" | "in" => Some(CutSide::Inside),
            "outside" | "outer" | "out" => Some(CutSide::Outside),
            _ => None,
        }
    }
}

/// Travel direction around the contour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutDirection {
    Cw,
    Ccw,
}

impl CutDirection {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "cw" | "clockwise" => Some(CutDirection::Cw),
            "ccw" | "counterclockwise" | "anti-clockwise" | "anticlockwise" => {
                Some(CutDirection::Ccw)
            }
            _ => None,
        }
    }
}

/// Compensation metadata of one operation, already normalised
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationRequest {
    /// The CAM system already offset the path; the control must not compensate again
    pub cam_compensated: bool,
    pub side: Option<CutSide>,
    pub direction: Option<CutDirection>,
}

/// Control-side radius compensation for a contour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusMode {
    None,
    Left,
    Right,
}

impl RadiusMode {
    pub fn derive(request: &CompensationRequest) -> Self {
        if request.cam_compensated {
            return RadiusMode::None;
        }
        match (request.side, request.direction) {
            (Some(CutSide::Left), _) => RadiusMode::Left,
            (Some(CutSide::Right), _) => RadiusMode::Right,
            (Some(CutSide::Inside), Some(CutDirection::Cw)) => RadiusMode::Right,
            (Some(CutSide::Inside), Some(CutDirection::Ccw)) => RadiusMode::Left,
            (Some(CutSide::Outside), Some(CutDirection::Cw)) => RadiusMode::Left,
            (Some(CutSide::Outside), Some(CutDirection::Ccw)) => RadiusMode::Right,
            _ => RadiusMode::None,
        }
    }

    pub fn word(self) -> Option<CompWord> {
        match self {
            RadiusMode::None => None,
            RadiusMode::Left => Some(CompWord::RL),
            RadiusMode::Right => Some(CompWord::RR),
        }
    }
}

/// Progress through the lead-in sequence. Strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationPhase {
    /// Approach moves, written with R0
    BeforeEntry,
    /// Entry reached, compensation not yet requested
    AtEntry,
    /// RL/RR requested and waiting for a move that is actually written
    Active,
    /// Compensation applied once; later moves carry no word
    Retired,
}

/// Where the contour plunges and enters, found in one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryScan {
    pub plunge: Option<usize>,
    pub entry: Option<usize>,
    /// A straight XY move exists before the entry move
    pub lead_in: bool,
}

impl EntryScan {
    pub fn scan(commands: &[PathCommand]) -> Self {
        let plunge = commands.iter().position(|c| {
            c.kind.is_straight() && c.params.z.is_some_and(|z| z < 0.0)
        });
        let entry = plunge.and_then(|plunge| {
            commands
                .iter()
                .enumerate()
                .skip(plunge + 1)
                .find(|(_, c)| c.kind.is_straight() && c.params.has_xy())
                .map(|(idx, _)| idx)
        });
        let lead_in = entry.is_some_and(|entry| {
            commands[..entry]
                .iter()
                .any(|c| c.kind.is_straight() && c.params.has_xy())
        });
        Self {
            plunge,
            entry,
            lead_in,
        }
    }
}

/// Rounding radius declared before the entry move, one decimal
pub fn rounding_radius(tool_radius: f64) -> f64 {
    let r = (1.05 * tool_radius).max(tool_radius + 0.5);
    (r * 10.0).round() / 10.0
}

pub struct ContourEmitter;

impl PathEmitter for ContourEmitter {
    fn emit(
        &self,
        ctx: &OperationContext<'_>,
        state: &mut MachineState,
        out: &mut NcOutput,
    ) -> EmitOutcome {
        let commands = ctx.commands;
        let mode = RadiusMode::derive(&ctx.compensation);
        let scan = EntryScan::scan(commands);
        let rnd = rounding_radius(ctx.tool_radius);

        debug!(
            op = ctx.label,
            ?mode,
            entry = ?scan.entry,
            lead_in = scan.lead_in,
            rnd,
            "contour emitter"
        );
        if ctx.debug_comments {
            let c = &ctx.compensation;
            out.push(format!(
                "(DEBUG CamCompensated={} Side={:?} Direction={:?})",
                c.cam_compensated, c.side, c.direction
            ));
            out.push(format!("(DEBUG LeadIn={})", scan.lead_in));
            out.push(format!("(DEBUG EntryIndex={:?})", scan.entry));
            out.push(format!("(DEBUG RND_RADIUS={:.1})", rnd));
            out.push(format!("(DEBUG RADIUS_MODE={:?})", mode));
        }

        let Some(comp) = mode.word() else {
            return emit_sequence(ctx, state, out, &scan, None, rnd);
        };
        if !scan.lead_in || scan.entry.is_none() {
            warn!(op = ctx.label, "radius compensation requested without lead-in");
            for line in LEAD_IN_ERROR {
                out.push(line);
            }
            return EmitOutcome::Aborted;
        }
        emit_sequence(ctx, state, out, &scan, Some(comp), rnd)
    }

    fn name(&self) -> &str {
        "contour"
    }

    fn supports_radius_compensation(&self) -> bool {
        true
    }
}

fn emit_sequence(
    ctx: &OperationContext<'_>,
    state: &mut MachineState,
    out: &mut NcOutput,
    scan: &EntryScan,
    comp: Option<CompWord>,
    rnd: f64,
) -> EmitOutcome {
    let commands = ctx.commands;

    // An arc right before the entry is flattened into the activation move
    let replaced_arc = match (comp, scan.entry) {
        (Some(_), Some(entry)) if entry > 0 => {
            let candidate = &commands[entry - 1];
            (candidate.kind.is_arc() && candidate.params.has_xy()).then_some(entry - 1)
        }
        _ => None,
    };

    let mut phase = CompensationPhase::BeforeEntry;
    let mut rnd_declared = false;

    for (idx, cmd) in commands.iter().enumerate() {
        let p = &cmd.params;
        let before_entry = phase == CompensationPhase::BeforeEntry
            && scan.entry.is_some_and(|entry| idx < entry);

        if phase == CompensationPhase::BeforeEntry && scan.entry == Some(idx) {
            phase = match comp {
                Some(_) => CompensationPhase::AtEntry,
                None => CompensationPhase::Retired,
            };
        }

        if cmd.kind.is_straight() {
            let rapid = cmd.kind == CommandKind::Rapid;
            emit_z_move(out, state, p.z, Feed::rapid_or(rapid, ctx.feed_z));
            if !p.has_xy() {
                continue;
            }

            let word = if before_entry {
                Some(CompWord::R0)
            } else {
                activate(&mut phase, comp)
            };
            let feed = Feed::rapid_or(rapid, ctx.feed_xy);
            let appended = emit_entry_move(out, state, p, feed, word, rnd, &mut rnd_declared);
            if appended && phase == CompensationPhase::Active {
                phase = CompensationPhase::Retired;
            }
        } else if cmd.kind.is_arc() {
            if replaced_arc == Some(idx) {
                debug!(op = ctx.label, idx, "lead-in arc replaced by straight move");
                emit_z_move(out, state, p.z, ctx.feed_z.map(Feed::Rate));
                phase = CompensationPhase::AtEntry;
                let word = activate(&mut phase, comp);
                let feed = ctx.feed_xy.map(Feed::Rate);
                if emit_entry_move(out, state, p, feed, word, rnd, &mut rnd_declared) {
                    phase = CompensationPhase::Retired;
                }
                continue;
            }

            let word = before_entry.then_some(CompWord::R0);
            let clockwise = cmd.kind == CommandKind::ArcCw;
            emit_arc(out, state, p, clockwise, ctx.feed_z, word);
        }
    }

    EmitOutcome::Completed
}

/// Compensation word for an XY move at or after the entry
fn activate(phase: &mut CompensationPhase, comp: Option<CompWord>) -> Option<CompWord> {
    if *phase == CompensationPhase::AtEntry {
        *phase = CompensationPhase::Active;
    }
    match *phase {
        CompensationPhase::Active => comp,
        _ => None,
    }
}

/// XY move that may carry RL/RR. The rounding radius is declared once,
/// right before the first compensated line that is actually written.
fn emit_entry_move(
    out: &mut NcOutput,
    state: &mut MachineState,
    p: &Params,
    feed: Option<Feed>,
    word: Option<CompWord>,
    rnd: f64,
    rnd_declared: &mut bool,
) -> bool {
    let compensating = matches!(word, Some(CompWord::RL | CompWord::RR));
    if compensating && !*rnd_declared && state.axis_changed(p.x, p.y, None) {
        out.push(format!("RND R{:.1}", rnd));
        *rnd_declared = true;
    }
    emit_xy_move(out, state, p, feed, word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_path;
    use pretty_assertions::assert_eq;

    fn request(side: &str, direction: &str) -> CompensationRequest {
        CompensationRequest {
            cam_compensated: false,
            side: CutSide::from_token(side),
            direction: CutDirection::from_token(direction),
        }
    }

    fn run(path: &str, compensation: CompensationRequest) -> (Vec<String>, EmitOutcome) {
        let parsed = parse_path(path);
        let ctx = OperationContext {
            label: "contour",
            commands: &parsed.commands,
            feed_xy: Some(600.0),
            feed_z: Some(200.0),
            tool_radius: 3.0,
            compensation,
            feed_scale: 60.0,
            debug_comments: false,
        };
        let mut state = MachineState::new();
        let mut out = NcOutput::new();
        let outcome = ContourEmitter.emit(&ctx, &mut state, &mut out);
        (out.lines, outcome)
    }

    const LEAD_IN_PATH: &str = "G0 Z5\nG0 X-5 Y0\nG1 Z-1\nG1 X0 Y0\nG1 X10 Y0\nG1 X10 Y10\n";

    #[test]
    fn test_radius_mode_derivation() {
        assert_eq!(RadiusMode::derive(&request("Left", "")), RadiusMode::Left);
        assert_eq!(RadiusMode::derive(&request("G42", "cw")), RadiusMode::Right);
        assert_eq!(RadiusMode::derive(&request("inside", "CW")), RadiusMode::Right);
        assert_eq!(RadiusMode::derive(&request("inside", "ccw")), RadiusMode::Left);
        assert_eq!(RadiusMode::derive(&request("Outside", "clockwise")), RadiusMode::Left);
        assert_eq!(
            RadiusMode::derive(&request("outer", "anti-clockwise")),
            RadiusMode::Right
        );
        assert_eq!(RadiusMode::derive(&request("outside", "")), RadiusMode::None);
        assert_eq!(RadiusMode::derive(&request("on", "cw")), RadiusMode::None);

        let mut compensated = request("left", "cw");
        compensated.cam_compensated = true;
        assert_eq!(RadiusMode::derive(&compensated), RadiusMode::None);
    }

    #[test]
    fn test_rounding_radius() {
        assert_eq!(rounding_radius(3.0), 3.5);
        assert_eq!(rounding_radius(20.0), 21.0);
        assert_eq!(rounding_radius(0.0), 0.5);
    }

    #[test]
    fn test_entry_scan() {
        let parsed = parse_path(LEAD_IN_PATH);
        let scan = EntryScan::scan(&parsed.commands);

        assert_eq!(scan.plunge, Some(2));
        assert_eq!(scan.entry, Some(3));
        assert!(scan.lead_in);
    }

    #[test]
    fn test_missing_lead_in_aborts() {
        let (lines, outcome) = run(
            "G0 Z5\nG1 Z-1\nG1 X10 Y0\nG1 X10 Y10\n",
            request("left", ""),
        );

        assert_eq!(lines, LEAD_IN_ERROR.to_vec());
        assert_eq!(outcome, EmitOutcome::Aborted);
    }

    #[test]
    fn test_missing_plunge_aborts() {
        let (lines, outcome) = run("G0 X0 Y0\nG1 X10 Y0\n", request("right", ""));

        assert_eq!(lines, LEAD_IN_ERROR.to_vec());
        assert_eq!(outcome, EmitOutcome::Aborted);
    }

    #[test]
    fn test_left_compensation_sequence() {
        let (lines, outcome) = run(LEAD_IN_PATH, request("left", ""));

        assert_eq!(outcome, EmitOutcome::Completed);
        assert_eq!(
            lines,
            vec![
                "L  Z+5.000  F9999",
                "L  X-5.000  Y+0.000  R0  F9999",
                "L  Z-1.000  F200",
                "RND R3.5",
                "L  X+0.000  Y+0.000  RL  F600",
                "L  X+10.000  Y+0.000",
                "L  X+10.000  Y+10.000",
            ]
        );
        assert_eq!(lines.iter().filter(|l| l.starts_with("RND")).count(), 1);
    }

    #[test]
    fn test_no_compensation_still_marks_approach() {
        let (lines, _) = run(LEAD_IN_PATH, CompensationRequest::default());

        assert_eq!(lines[1], "L  X-5.000  Y+0.000  R0  F9999");
        assert_eq!(lines[3], "L  X+0.000  Y+0.000  F600");
        assert!(!lines.iter().any(|l| l.starts_with("RND")));
    }

    #[test]
    fn test_suppressed_entry_keeps_compensation_pending() {
        // Entry move lands where the lead-in already is
        let (lines, _) = run(
            "G0 X0 Y0 Z5\nG1 Z-1\nG1 X0 Y0\nG1 X10 Y0\nG1 X10 Y10\n",
            request("right", ""),
        );

        assert_eq!(
            lines,
            vec![
                "L  Z+5.000  F9999",
                "L  X+0.000  Y+0.000  R0  F9999",
                "L  Z-1.000  F200",
                "RND R3.5",
                "L  X+10.000  Y+0.000  RR  F600",
                "L  X+10.000  Y+10.000",
            ]
        );
    }

    #[test]
    fn test_no_rounding_radius_without_compensated_move() {
        // Entry is suppressed and the path only retracts afterwards
        let (lines, outcome) = run(
            "G0 X0 Y0 Z5\nG1 Z-1\nG1 X0 Y0\nG1 Z5\n",
            request("right", ""),
        );

        assert_eq!(outcome, EmitOutcome::Completed);
        assert_eq!(
            lines,
            vec![
                "L  Z+5.000  F9999",
                "L  X+0.000  Y+0.000  R0  F9999",
                "L  Z-1.000  F200",
                "L  Z+5.000",
            ]
        );
    }

    #[test]
    fn test_arcs_carry_phase_word() {
        let (lines, _) = run(
            "G0 X0 Y0\nG2 X0 Y0 I5 J0\nG1 Z-1\nG1 X10 Y0\nG3 X20 Y0 I5\n",
            CompensationRequest::default(),
        );

        assert_eq!(lines[2], "C  X+0.000  Y+0.000  DR- R0");
        assert_eq!(lines[6], "C  X+20.000  Y+0.000  DR+");
    }

    #[test]
    fn test_lead_in_arc_replaced() {
        let (lines, _) = run(
            "G0 X-10 Y-5\nG1 Z-1\nG2 X-5 Y0 I5 J0\nG1 X10 Y0\n",
            request("outside", "cw"),
        );

        assert_eq!(
            lines,
            vec![
                "L  X-10.000  Y-5.000  R0  F9999",
                "L  Z-1.000  F200",
                "RND R3.5",
                "L  X-5.000  Y+0.000  RL  F600",
                "L  X+10.000  Y+0.000",
            ]
        );
    }
}
