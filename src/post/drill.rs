//! Drilling emitter
//!
//! Canned cycles (G81/G82/G83) become Heidenhain cycle 1 (TIEFBOHREN).
//! Consecutive cycles with identical parameters share one `CYCL DEF` block
//! followed by a positioning move and `CYCL CALL` per hole.

use tracing::debug;

use super::format::{
    format_dwell_comma_decimal, format_feed_scaled, format_negated_magnitude, format_signed_fixed,
};
use super::output::{build_move_line, Feed, MoveWords, NcOutput};
use super::state::MachineState;
use super::{EmitOutcome, OperationContext, PathEmitter};
use crate::ast::{CommandKind, CycleKind, Params};

/// Cycle defaults when the path leaves a word out
const DEFAULT_DEPTH: f64 = -5.0;
const DEFAULT_RETRACT: f64 = 2.0;
const DEFAULT_FEED: f64 = 80.0;
/// Feed number used when the cycle feed cannot be formatted
const FALLBACK_FEED: i64 = 60;

/// Modal and wrapper commands that carry no geometry
const NOISE_CODES: [&str; 5] = ["G90", "G98", "G99", "G17", "G21"];

/// Parameters of one drilling cycle, in path units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleParams {
    pub kind: CycleKind,
    pub depth: f64,
    pub retract: f64,
    /// mm/s
    pub feed: f64,
    pub dwell: f64,
    pub peck: Option<f64>,
}

impl CycleParams {
    /// Cycle words are modal: a word left out repeats the previous cycle
    /// of the same kind, falling back to the defaults.
    pub fn from_command(kind: CycleKind, p: &Params, previous: Option<&CycleParams>) -> Self {
        let previous = previous.filter(|c| c.kind == kind);
        Self {
            kind,
            depth: p.z.or(previous.map(|c| c.depth)).unwrap_or(DEFAULT_DEPTH),
            retract: p.r.or(previous.map(|c| c.retract)).unwrap_or(DEFAULT_RETRACT),
            feed: p.f.or(previous.map(|c| c.feed)).unwrap_or(DEFAULT_FEED),
            dwell: match kind {
                CycleKind::G82 => p.p.or(previous.map(|c| c.dwell)).unwrap_or(0.0),
                _ => 0.0,
            },
            peck: match kind {
                CycleKind::G83 => p.q.or(previous.and_then(|c| c.peck)),
                _ => None,
            },
        }
    }

    /// Grouping key, numbers rounded so float noise does not split groups
    pub fn key(&self) -> GroupKey {
        GroupKey {
            kind: self.kind,
            depth: quantize(self.depth),
            retract: quantize(self.retract),
            feed: quantize(self.feed),
            dwell: quantize(self.dwell),
            peck: self.peck.map(quantize),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupKey {
    kind: CycleKind,
    depth: f64,
    retract: f64,
    feed: f64,
    dwell: f64,
    peck: Option<f64>,
}

fn quantize(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Holes collected for the current cycle definition
#[derive(Debug, Clone, Default)]
pub struct DrillGroup {
    pub active: bool,
    pub cycle: Option<CycleParams>,
    pub key: Option<GroupKey>,
    pub points: Vec<(Option<f64>, Option<f64>)>,
}

impl DrillGroup {
    /// Whether a cycle with this key can join the current group
    pub fn accepts(&self, key: &GroupKey) -> bool {
        self.active && self.key.as_ref() == Some(key)
    }

    pub fn start(&mut self, cycle: CycleParams) {
        self.active = true;
        self.key = Some(cycle.key());
        self.cycle = Some(cycle);
        self.points.clear();
    }

    /// Write the cycle definition and one call per hole, then deactivate
    pub fn flush(&mut self, out: &mut NcOutput, state: &mut MachineState, feed_scale: f64) {
        if !self.active {
            return;
        }
        self.active = false;
        let points = std::mem::take(&mut self.points);
        let Some(cycle) = self.cycle.take() else {
            return;
        };
        if points.is_empty() {
            return;
        }

        emit_cycle_def(out, &cycle, feed_scale);
        for (x, y) in points {
            let line = build_move_line(state, &MoveWords::xy(x, y, Some(Feed::Rapid)));
            out.push_unique(line);
            out.push("CYCL CALL");
        }
    }
}

fn emit_cycle_def(out: &mut NcOutput, cycle: &CycleParams, feed_scale: f64) {
    let depth = format_signed_fixed(cycle.depth);
    let feed = format_feed_scaled(cycle.feed, feed_scale).unwrap_or(FALLBACK_FEED);

    out.push("CYCL DEF 1.0 TIEFBOHREN");
    out.push(format!(
        "CYCL DEF 1.1 ABST {}",
        format_negated_magnitude(cycle.retract)
    ));
    out.push(format!("CYCL DEF 1.2 TIEFE {}", depth));
    match cycle.peck {
        Some(peck) => out.push(format!(
            "CYCL DEF 1.3 ZUSTLG {}",
            format_negated_magnitude(peck)
        )),
        None => out.push(format!("CYCL DEF 1.3 ZUSTLG {}", depth)),
    }
    match cycle.kind {
        CycleKind::G82 => out.push(format!(
            "CYCL DEF 1.4 VZEIT {}",
            format_dwell_comma_decimal(cycle.dwell, 3)
        )),
        _ => out.push("CYCL DEF 1.4 VZEIT 0,000"),
    }
    out.push(format!("CYCL DEF 1.5 F{}", feed));
}

fn is_noise(name: &str) -> bool {
    name.starts_with('(') || NOISE_CODES.contains(&name)
}

pub struct DrillEmitter;

impl PathEmitter for DrillEmitter {
    fn emit(
        &self,
        ctx: &OperationContext<'_>,
        state: &mut MachineState,
        out: &mut NcOutput,
    ) -> EmitOutcome {
        debug!(op = ctx.label, commands = ctx.commands.len(), "drill emitter");
        let mut group = DrillGroup::default();
        let mut last_cycle: Option<CycleParams> = None;

        for cmd in ctx.commands {
            let p = &cmd.params;
            let x = p.x.or(state.x);
            let y = p.y.or(state.y);
            let z = p.z.or(state.z);

            match &cmd.kind {
                CommandKind::Other(name) if is_noise(name) => continue,
                CommandKind::CycleCancel => {
                    group.flush(out, state, ctx.feed_scale);
                    last_cycle = None;
                    continue;
                }
                CommandKind::Rapid | CommandKind::Linear => {
                    // Holes collected so far are drilled before the tool moves on
                    group.flush(out, state, ctx.feed_scale);
                    let feed = match cmd.kind {
                        CommandKind::Rapid => Some(Feed::Rapid),
                        _ => p.f.map(|f| Feed::Rate(f * ctx.feed_scale)),
                    };
                    let line = build_move_line(state, &MoveWords::xyz(x, y, z, feed));
                    out.push_unique(line);
                }
                CommandKind::DrillCycle(kind) => {
                    let cycle = CycleParams::from_command(*kind, p, last_cycle.as_ref());
                    last_cycle = Some(cycle);
                    if !p.has_xy() {
                        // Modal word update only; no hole at this line
                        debug!(op = ctx.label, ?cycle, "cycle words updated");
                        continue;
                    }
                    if !group.accepts(&cycle.key()) {
                        group.flush(out, state, ctx.feed_scale);
                        debug!(op = ctx.label, ?cycle, "new drill group");
                        group.start(cycle);
                    }
                    group.points.push((x, y));

                    // Z here is the hole depth; the cycle retracts on its own
                    state.update_position(p.x, p.y, None);
                    state.z = None;
                    continue;
                }
                other => {
                    out.warn(&format!("UNSUPPORTED {} {}", other.name(), p));
                }
            }

            state.update_position(p.x, p.y, p.z);
        }

        group.flush(out, state, ctx.feed_scale);
        EmitOutcome::Completed
    }

    fn name(&self) -> &str {
        "drill"
    }

    fn supports_radius_compensation(&self) -> bool {
        false
    }
}
