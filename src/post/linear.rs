//! Straight and circular moves without compensation sequencing

use tracing::debug;

use super::output::{
    append_if_axis_changed, build_circle_center, build_circular_move, CompWord, Feed, MoveWords,
    NcOutput,
};
use super::state::MachineState;
use super::{EmitOutcome, OperationContext, PathEmitter};
use crate::ast::{CommandKind, Params};

pub struct LinearEmitter;

impl PathEmitter for LinearEmitter {
    fn emit(
        &self,
        ctx: &OperationContext<'_>,
        state: &mut MachineState,
        out: &mut NcOutput,
    ) -> EmitOutcome {
        debug!(op = ctx.label, commands = ctx.commands.len(), "linear emitter");

        for cmd in ctx.commands {
            let p = &cmd.params;
            match cmd.kind {
                CommandKind::Rapid | CommandKind::Linear => {
                    let rapid = cmd.kind == CommandKind::Rapid;
                    emit_z_move(out, state, p.z, Feed::rapid_or(rapid, ctx.feed_z));
                    emit_xy_move(out, state, p, Feed::rapid_or(rapid, ctx.feed_xy), None);
                }
                CommandKind::ArcCw | CommandKind::ArcCcw => {
                    emit_arc(out, state, p, cmd.kind == CommandKind::ArcCw, ctx.feed_z, None);
                }
                _ => {}
            }
        }

        EmitOutcome::Completed
    }

    fn name(&self) -> &str {
        "linear"
    }

    fn supports_radius_compensation(&self) -> bool {
        false
    }
}

/// Z-only move, written when Z is programmed and changes the known height
pub(crate) fn emit_z_move(
    out: &mut NcOutput,
    state: &mut MachineState,
    z: Option<f64>,
    feed: Option<Feed>,
) {
    let Some(z) = z else { return };
    if append_if_axis_changed(out, state, &MoveWords::z(z, feed)) {
        state.z = Some(z);
    }
}

/// XY move; returns whether a line was appended.
/// The programmed axes are recorded even when the line was suppressed.
pub(crate) fn emit_xy_move(
    out: &mut NcOutput,
    state: &mut MachineState,
    p: &Params,
    feed: Option<Feed>,
    comp: Option<CompWord>,
) -> bool {
    if !p.has_xy() {
        return false;
    }
    let words = MoveWords::xy(p.x, p.y, feed).with_comp(comp);
    let appended = append_if_axis_changed(out, state, &words);
    state.update_position(p.x, p.y, None);
    appended
}

/// Circular move: optional Z move, `CC` from the incremental center offset, then `C`.
pub(crate) fn emit_arc(
    out: &mut NcOutput,
    state: &mut MachineState,
    p: &Params,
    clockwise: bool,
    feed_z: Option<f64>,
    comp: Option<CompWord>,
) {
    emit_z_move(out, state, p.z, feed_z.map(Feed::Rate));

    if p.i.is_some() || p.j.is_some() {
        let center = match (state.x, state.y) {
            (Some(x), Some(y)) => {
                build_circle_center(x + p.i.unwrap_or(0.0), y + p.j.unwrap_or(0.0))
            }
            _ => None,
        };
        match center {
            Some(line) => out.push(line),
            None => out.warn("arc start unknown, circle center not declared"),
        }
    }

    let x = p.x.or(state.x);
    let y = p.y.or(state.y);
    out.push(build_circular_move(x, y, clockwise, comp));
    state.update_position(p.x, p.y, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_path;
    use crate::post::CompensationRequest;
    use pretty_assertions::assert_eq;

    fn run(path: &str, state: &mut MachineState) -> Vec<String> {
        let parsed = parse_path(path);
        let ctx = OperationContext {
            label: "test",
            commands: &parsed.commands,
            feed_xy: Some(600.0),
            feed_z: Some(200.0),
            tool_radius: 3.0,
            compensation: CompensationRequest::default(),
            feed_scale: 60.0,
            debug_comments: false,
        };
        let mut out = NcOutput::new();
        LinearEmitter.emit(&ctx, state, &mut out);
        out.lines
    }

    #[test]
    fn test_z_before_xy() {
        let mut state = MachineState::new();
        let lines = run("G0 X10 Y10 Z5\nG1 X20 Y10 Z-1\n", &mut state);

        assert_eq!(
            lines,
            vec![
                "L  Z+5.000  F9999",
                "L  X+10.000  Y+10.000  F9999",
                "L  Z-1.000  F200",
                "L  X+20.000  Y+10.000  F600",
            ]
        );
        assert_eq!((state.x, state.y, state.z), (Some(20.0), Some(10.0), Some(-1.0)));
    }

    #[test]
    fn test_repeated_rapid_emits_once() {
        let mut state = MachineState::new();
        let lines = run("G0 X10 Y10 Z5\nG0 X10 Y10 Z5\n", &mut state);

        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_arc_with_center() {
        let mut state = MachineState::new();
        let lines = run("G0 X0 Y0\nG2 X10 Y0 I5 J0\nG3 X0 Y0 I-5\n", &mut state);

        assert_eq!(
            lines,
            vec![
                "L  X+0.000  Y+0.000  F9999",
                "CC  X+5.000  Y+0.000",
                "C  X+10.000  Y+0.000  DR-",
                "CC  X+5.000  Y+0.000",
                "C  X+0.000  Y+0.000  DR+",
            ]
        );
        assert_eq!(state.x, Some(0.0));
    }

    #[test]
    fn test_arc_from_unknown_position() {
        let mut state = MachineState::new();
        let lines = run("G2 X10 Y0 I5 J0\n", &mut state);

        assert_eq!(
            lines,
            vec![
                "; WARN: arc start unknown, circle center not declared",
                "C  X+10.000  Y+0.000  DR-",
            ]
        );
    }

    #[test]
    fn test_other_commands_ignored() {
        let mut state = MachineState::new();
        let lines = run("G90\nM3\n(comment)\n", &mut state);

        assert!(lines.is_empty());
        assert_eq!(state, MachineState::new());
    }
}
