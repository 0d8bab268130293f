//! Path command model
//! One command per source line, consumed in order by the emitters

use std::fmt;

/// Canned drilling cycles the drill emitter turns into `CYCL DEF 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleKind {
    G81, // Plain drilling
    G82, // Drilling with dwell at depth
    G83, // Peck drilling
}

impl CycleKind {
    pub fn code(self) -> &'static str {
        match self {
            CycleKind::G81 => "G81",
            CycleKind::G82 => "G82",
            CycleKind::G83 => "G83",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Rapid,      // G0
    Linear,     // G1
    ArcCw,      // G2
    ArcCcw,     // G3
    DrillCycle(CycleKind),
    CycleCancel, // G80
    /// Anything else, keeping its upper-cased name (`G90`, `(BEGIN DRILLING)`, `M3`...)
    Other(String),
}

impl CommandKind {
    /// Map a normalised command name to its kind
    pub fn from_name(name: &str) -> Self {
        match name {
            "G0" => CommandKind::Rapid,
            "G1" => CommandKind::Linear,
            "G2" => CommandKind::ArcCw,
            "G3" => CommandKind::ArcCcw,
            "G81" => CommandKind::DrillCycle(CycleKind::G81),
            "G82" => CommandKind::DrillCycle(CycleKind::G82),
            "G83" => CommandKind::DrillCycle(CycleKind::G83),
            "G80" => CommandKind::CycleCancel,
            other => CommandKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CommandKind::Rapid => "G0",
            CommandKind::Linear => "G1",
            CommandKind::ArcCw => "G2",
            CommandKind::ArcCcw => "G3",
            CommandKind::DrillCycle(kind) => kind.code(),
            CommandKind::CycleCancel => "G80",
            CommandKind::Other(name) => name,
        }
    }

    /// Rapid or linear feed move
    pub fn is_straight(&self) -> bool {
        matches!(self, CommandKind::Rapid | CommandKind::Linear)
    }

    pub fn is_arc(&self) -> bool {
        matches!(self, CommandKind::ArcCw | CommandKind::ArcCcw)
    }

    /// Motion codes stay modal for following parameter-only lines
    pub fn is_motion(&self) -> bool {
        self.is_straight() || self.is_arc() || matches!(self, CommandKind::DrillCycle(_))
    }
}

/// Word values of one command. Absent means "not programmed" (or unparsable).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Params {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub i: Option<f64>, // Arc center offset, relative to the start point
    pub j: Option<f64>,
    pub r: Option<f64>, // Retract plane
    pub p: Option<f64>, // Dwell (s)
    pub q: Option<f64>, // Peck depth
    pub f: Option<f64>, // Feed, mm/s
}

impl Params {
    pub fn has_xy(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    /// Store a word value. Unknown letters are ignored.
    pub fn set(&mut self, letter: char, value: Option<f64>) {
        let slot = match letter {
            'X' => &mut self.x,
            'Y' => &mut self.y,
            'Z' => &mut self.z,
            'I' => &mut self.i,
            'J' => &mut self.j,
            'R' => &mut self.r,
            'P' => &mut self.p,
            'Q' => &mut self.q,
            'F' => &mut self.f,
            _ => return,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        *self == Params::default()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = [
            ('X', self.x),
            ('Y', self.y),
            ('Z', self.z),
            ('I', self.i),
            ('J', self.j),
            ('R', self.r),
            ('P', self.p),
            ('Q', self.q),
            ('F', self.f),
        ];
        let mut first = true;
        for (letter, value) in words {
            if let Some(v) = value {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}={}", letter, v)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A single path command as produced by the path source
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    pub kind: CommandKind,
    pub params: Params,
}

impl PathCommand {
    pub fn new(kind: CommandKind, params: Params) -> Self {
        Self { kind, params }
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }
}
