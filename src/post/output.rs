//! Output line buffer and the `L`/`CC`/`C` line builders

use super::format::{format_feed_integer, format_signed_coordinate, RAPID_FEED};
use super::state::MachineState;

/// Append-only list of program lines for one export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NcOutput {
    pub lines: Vec<String>,
}

impl NcOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append only if the line differs from the previous one
    pub fn push_unique(&mut self, line: impl Into<String>) -> bool {
        let line = line.into();
        if self.lines.last() == Some(&line) {
            return false;
        }
        self.lines.push(line);
        true
    }

    /// Diagnostic line the machinist sees in the program
    pub fn warn(&mut self, message: &str) {
        self.lines.push(format!("; WARN: {}", message));
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Feed word request for a move line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feed {
    /// Written as `F9999` on every line, never suppressed
    Rapid,
    /// mm/min, written only when it changes the modal feed
    Rate(f64),
}

impl Feed {
    pub fn rapid_or(rapid: bool, rate: Option<f64>) -> Option<Feed> {
        if rapid {
            Some(Feed::Rapid)
        } else {
            rate.map(Feed::Rate)
        }
    }
}

/// Cutter radius compensation word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompWord {
    R0,
    RL,
    RR,
}

impl CompWord {
    pub fn as_str(self) -> &'static str {
        match self {
            CompWord::R0 => "R0",
            CompWord::RL => "RL",
            CompWord::RR => "RR",
        }
    }
}

/// Words of one straight move line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveWords {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub feed: Option<Feed>,
    pub comp: Option<CompWord>,
}

impl MoveWords {
    pub fn z(z: f64, feed: Option<Feed>) -> Self {
        Self {
            z: Some(z),
            feed,
            ..Self::default()
        }
    }

    pub fn xy(x: Option<f64>, y: Option<f64>, feed: Option<Feed>) -> Self {
        Self {
            x,
            y,
            feed,
            ..Self::default()
        }
    }

    pub fn xyz(x: Option<f64>, y: Option<f64>, z: Option<f64>, feed: Option<Feed>) -> Self {
        Self {
            x,
            y,
            z,
            feed,
            comp: None,
        }
    }

    pub fn with_comp(mut self, comp: Option<CompWord>) -> Self {
        self.comp = comp;
        self
    }
}

/// Build one `L` line. Updates the modal feed when a feed word is written.
pub fn build_move_line(state: &mut MachineState, words: &MoveWords) -> String {
    let mut parts = vec!["L".to_string()];
    for (letter, value) in [('X', words.x), ('Y', words.y), ('Z', words.z)] {
        if let Some(word) = value.and_then(|v| format_signed_coordinate(letter, v, 3)) {
            parts.push(word);
        }
    }
    if let Some(comp) = words.comp {
        parts.push(comp.as_str().to_string());
    }

    match words.feed {
        Some(Feed::Rapid) => {
            parts.push(format!("F{}", RAPID_FEED));
            state.feed_modal = Some(RAPID_FEED);
        }
        Some(Feed::Rate(rate)) => {
            if let Some(n) = format_feed_integer(rate) {
                if state.feed_modal != Some(n) {
                    parts.push(format!("F{}", n));
                    state.feed_modal = Some(n);
                }
            }
        }
        None => {}
    }

    parts.join("  ")
}

/// Append a move only if one of its axes changes the known position.
///
/// The caller records the new position in `state` afterwards.
pub fn append_if_axis_changed(
    out: &mut NcOutput,
    state: &mut MachineState,
    words: &MoveWords,
) -> bool {
    if !state.axis_changed(words.x, words.y, words.z) {
        return false;
    }
    let line = build_move_line(state, words);
    out.push(line);
    true
}

/// Append a line unless it repeats the previous one verbatim
pub fn append_if_different_from_last(out: &mut NcOutput, line: impl Into<String>) -> bool {
    out.push_unique(line)
}

/// `CC  X+..  Y+..` circle center declaration
pub fn build_circle_center(cx: f64, cy: f64) -> Option<String> {
    Some(format!(
        "CC  {}  {}",
        format_signed_coordinate('X', cx, 3)?,
        format_signed_coordinate('Y', cy, 3)?
    ))
}

/// `C  X+..  Y+..  DR-` circular move, optionally followed by a compensation word
pub fn build_circular_move(
    x: Option<f64>,
    y: Option<f64>,
    clockwise: bool,
    comp: Option<CompWord>,
) -> String {
    let mut parts = vec!["C".to_string()];
    for (letter, value) in [('X', x), ('Y', y)] {
        if let Some(word) = value.and_then(|v| format_signed_coordinate(letter, v, 3)) {
            parts.push(word);
        }
    }
    parts.push(if clockwise { "DR-" } else { "DR+" }.to_string());
    let mut line = parts.join("  ");
    if let Some(comp) = comp {
        line.push(' ');
        line.push_str(comp.as_str());
    }
    line
}
