//! Job description - operations, tool controllers and post settings
//!
//! A job is the JSON export of a CAM document. Dressup operations point at
//! the operation they modify through `base`; properties a dressup leaves
//! out are taken from its base chain.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::post::{CompensationRequest, CutDirection, CutSide};
use crate::tool_library::{ToolControllerDef, ToolTable, MMPS_TO_MMMIN};

/// Longest dressup chain followed before giving up
pub const MAX_CHAIN_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("failed to read job {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid job description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Post-processor settings, embedded in the job under `"post"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostConfig {
    /// Retract height before a tool change, mm
    pub toolchange_z: f64,
    /// Path feed units to program feed units
    pub feed_scale: f64,
    /// Paths longer than this are emitted as plain moves
    pub linear_threshold: usize,
    /// Fallback heights for operations that set none. Only checked by the
    /// validator; the emitted moves come from the path itself.
    pub default_safe_height: f64,
    pub default_clearance_height: f64,
    /// Write `(DEBUG ...)` lines from the contour emitter
    pub debug_comments: bool,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            toolchange_z: 150.0,
            feed_scale: MMPS_TO_MMMIN,
            linear_threshold: 500,
            default_safe_height: 5.0,
            default_clearance_height: 50.0,
            debug_comments: false,
        }
    }
}

/// A flag CAM exports either as a JSON bool or as text ("yes", "1", ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FlagToken {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagToken {
    /// Unrecognised text counts as false
    pub fn as_bool(&self) -> bool {
        match self {
            FlagToken::Bool(b) => *b,
            FlagToken::Number(n) => *n != 0.0,
            FlagToken::Text(t) => matches!(
                t.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "y" | "on"
            ),
        }
    }
}

fn default_active() -> bool {
    true
}

/// One operation (or dressup) of the job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub label: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Label of the operation this one is a dressup of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, alias = "tool_number", skip_serializing_if = "Option::is_none")]
    pub tool: Option<u32>,

    /// CAM already offset the path by the tool radius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_comp: Option<FlagToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,

    /// Overrides the tool table diameter, mm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_diameter: Option<f64>,

    /// Absolute, mm. Validated against `clearance_height`, never emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_height: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearance_height: Option<f64>,

    /// Path commands, one per line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Operation {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            active: true,
            base: None,
            tool: None,
            use_comp: None,
            side: None,
            direction: None,
            tool_diameter: None,
            safe_height: None,
            clearance_height: None,
            path: None,
        }
    }
}

/// An operation with every property looked up along its base chain
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperation<'a> {
    pub label: &'a str,
    pub tool: Option<u32>,
    pub compensation: CompensationRequest,
    pub tool_diameter: Option<f64>,
    /// For validation and logging; paths carry their own retract moves
    pub safe_height: f64,
    pub clearance_height: f64,
    pub path: Option<&'a str>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub post: PostConfig,

    #[serde(default)]
    pub tools: Vec<ToolControllerDef>,

    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Job {
    pub fn from_json(text: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, JobError> {
        let text = std::fs::read_to_string(path).map_err(|source| JobError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn operation(&self, label: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.label == label)
    }

    pub fn tool_table(&self) -> ToolTable {
        ToolTable::from_controllers(&self.tools, self.post.feed_scale)
    }

    /// The operation followed by its bases, nearest first.
    ///
    /// Stops at an unknown base, a repeated label or after
    /// [`MAX_CHAIN_DEPTH`] links; the validator reports those.
    pub fn resolve_chain<'a>(&'a self, op: &'a Operation) -> Vec<&'a Operation> {
        let mut chain = vec![op];
        let mut visited: HashSet<&str> = HashSet::from([op.label.as_str()]);
        let mut current = op;

        for _ in 0..MAX_CHAIN_DEPTH {
            let Some(base) = current.base.as_deref().and_then(|b| self.operation(b)) else {
                break;
            };
            if !visited.insert(base.label.as_str()) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    pub fn resolve<'a>(&'a self, op: &'a Operation) -> ResolvedOperation<'a> {
        let chain = self.resolve_chain(op);

        ResolvedOperation {
            label: &op.label,
            tool: effective(&chain, |o| o.tool),
            compensation: compensation_request(&chain),
            tool_diameter: effective(&chain, |o| o.tool_diameter),
            safe_height: effective(&chain, |o| o.safe_height)
                .unwrap_or(self.post.default_safe_height),
            clearance_height: effective(&chain, |o| o.clearance_height)
                .unwrap_or(self.post.default_clearance_height),
            path: effective(&chain, |o| o.path.as_deref().filter(|p| !p.trim().is_empty())),
        }
    }
}

/// First value defined along the chain
pub fn effective<'a, T>(
    chain: &[&'a Operation],
    get: impl Fn(&'a Operation) -> Option<T>,
) -> Option<T> {
    chain.iter().find_map(|op| get(*op))
}

/// Normalise the free-form compensation metadata
pub fn compensation_request(chain: &[&Operation]) -> CompensationRequest {
    CompensationRequest {
        cam_compensated: effective(chain, |o| o.use_comp.as_ref().map(FlagToken::as_bool))
            .unwrap_or(false),
        side: effective(chain, |o| o.side.as_deref()).and_then(CutSide::from_token),
        direction: effective(chain, |o| o.direction.as_deref()).and_then(CutDirection::from_token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job() -> Job {
        Job::from_json(
            r#"{
                "name": "PLATE",
                "tools": [{"number": 1, "diameter": 6.0}],
                "operations": [
                    {"label": "Profile", "tool": 1, "side": "Outside", "direction": "CW",
                     "use_comp": "False", "safe_height": 3.0, "path": "G0 X0 Y0\n"},
                    {"label": "Tag", "base": "Profile", "path": "G0 X1 Y1\n"},
                    {"label": "Ramp", "base": "Tag", "active": false}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_post_defaults() {
        let job = job();
        assert_eq!(job.post, PostConfig::default());
        assert_eq!(job.post.toolchange_z, 150.0);
        assert_eq!(job.post.linear_threshold, 500);
    }

    #[test]
    fn test_partial_post_config() {
        let job = Job::from_json(r#"{"post": {"toolchange_z": 200, "debug_comments": true}}"#)
            .unwrap();
        assert_eq!(job.post.toolchange_z, 200.0);
        assert!(job.post.debug_comments);
        assert_eq!(job.post.feed_scale, 60.0);
    }

    #[test]
    fn test_chain_nearest_first() {
        let job = job();
        let ramp = job.operation("Ramp").unwrap();
        let labels: Vec<&str> = job
            .resolve_chain(ramp)
            .iter()
            .map(|o| o.label.as_str())
            .collect();

        assert_eq!(labels, vec!["Ramp", "Tag", "Profile"]);
    }

    #[test]
    fn test_resolve_inherits_from_base() {
        let job = job();
        let resolved = job.resolve(job.operation("Ramp").unwrap());

        assert_eq!(resolved.tool, Some(1));
        assert_eq!(resolved.path, Some("G0 X1 Y1\n"));
        assert_eq!(resolved.safe_height, 3.0);
        assert_eq!(resolved.clearance_height, 50.0);
        assert_eq!(
            resolved.compensation,
            CompensationRequest {
                cam_compensated: false,
                side: Some(CutSide::Outside),
                direction: Some(CutDirection::Cw),
            }
        );
    }

    #[test]
    fn test_cyclic_chain_terminates() {
        let mut a = Operation::new("A");
        a.base = Some("B".to_string());
        let mut b = Operation::new("B");
        b.base = Some("A".to_string());
        let job = Job {
            operations: vec![a, b],
            ..Job::default()
        };

        let chain = job.resolve_chain(&job.operations[0]);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_flag_tokens() {
        assert!(FlagToken::Bool(true).as_bool());
        assert!(FlagToken::Text(" Yes ".to_string()).as_bool());
        assert!(FlagToken::Number(1.0).as_bool());
        assert!(!FlagToken::Text("maybe".to_string()).as_bool());
        assert!(!FlagToken::Text("off".to_string()).as_bool());
    }

    #[test]
    fn test_operation_without_label_rejected() {
        let err = Job::from_json(r#"{"operations": [{"active": true}]}"#).unwrap_err();
        assert!(matches!(err, JobError::Json(_)));
    }
}
