//! Program generator
//! Walks the job's operations and assembles the numbered TNC program

use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::job::{Job, PostConfig, ResolvedOperation};
use crate::parser::{parse_path, ParseError};
use crate::post::format::format_signed_coordinate;
use crate::post::{
    EmitOutcome, EmitterType, MachineState, NcOutput, OperationContext, RadiusMode,
};
use crate::tool_library::{ToolInfo, ToolTable, ToolTableError};

#[derive(Error, Debug)]
pub enum PostError {
    #[error(transparent)]
    Tools(#[from] ToolTableError),
}

/// A path diagnostic with the text it points into
#[derive(Debug, Clone)]
pub struct PathDiagnostic {
    pub operation: String,
    pub source: String,
    pub error: ParseError,
}

/// Finished program, unnumbered
#[derive(Debug, Clone, Default)]
pub struct NcProgram {
    pub name: String,
    pub lines: Vec<String>,
    pub diagnostics: Vec<PathDiagnostic>,
}

impl fmt::Display for NcProgram {
    /// Numbered from 0, with an empty line 0
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = std::iter::once("").chain(self.lines.iter().map(String::as_str));
        for (i, line) in lines.enumerate() {
            writeln!(f, "{} {}", i, line)?;
        }
        Ok(())
    }
}

pub struct ProgramGenerator<'a> {
    job: &'a Job,
    config: PostConfig,
    tools: ToolTable,
}

impl<'a> ProgramGenerator<'a> {
    pub fn new(job: &'a Job) -> Self {
        Self {
            job,
            config: job.post.clone(),
            tools: job.tool_table(),
        }
    }

    /// Replace the job's post settings (e.g. with command line overrides)
    pub fn with_config(mut self, config: PostConfig) -> Self {
        self.tools = ToolTable::from_controllers(&self.job.tools, config.feed_scale);
        self.config = config;
        self
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    /// Export the whole job. Every call starts from a fresh machine state.
    pub fn generate(&self, name: &str) -> Result<NcProgram, PostError> {
        self.tools.ensure_not_empty()?;

        let mut state = MachineState::new();
        let mut out = NcOutput::new();
        let mut diagnostics = Vec::new();

        out.push(format!("BEGIN PGM {} MM", name));

        for op in self.job.operations.iter().filter(|op| op.active) {
            let resolved = self.job.resolve(op);
            self.emit_operation(&resolved, &mut state, &mut out, &mut diagnostics);
        }

        out.push(format!("END PGM {} MM", name));
        info!(name, lines = out.len(), "program generated");

        Ok(NcProgram {
            name: name.to_string(),
            lines: out.lines,
            diagnostics,
        })
    }

    fn emit_operation(
        &self,
        op: &ResolvedOperation<'_>,
        state: &mut MachineState,
        out: &mut NcOutput,
        diagnostics: &mut Vec<PathDiagnostic>,
    ) {
        let Some(source) = op.path else {
            debug!(op = op.label, "no path, skipped");
            return;
        };

        let parsed = parse_path(source);
        for error in &parsed.errors {
            warn!(op = op.label, %error, "path diagnostic");
            out.warn(&format!("{}: {}", op.label, error));
            diagnostics.push(PathDiagnostic {
                operation: op.label.to_string(),
                source: source.to_string(),
                error: error.clone(),
            });
        }
        if parsed.commands.is_empty() {
            return;
        }

        if let Some(number) = op.tool {
            if state.active_tool != Some(number) {
                self.emit_tool_change(number, state, out);
            }
        }

        let tool = self.tools.get(state.active_tool);
        let tool_radius = op
            .tool_diameter
            .map(|d| d / 2.0)
            .or_else(|| tool.and_then(ToolInfo::radius))
            .unwrap_or(0.0);

        let emitter_type = EmitterType::classify(&parsed.commands, self.config.linear_threshold);
        let emitter = emitter_type.get_emitter();
        debug!(
            op = op.label,
            emitter = emitter.name(),
            commands = parsed.commands.len(),
            safe = op.safe_height,
            clearance = op.clearance_height,
            "emitting operation"
        );

        if RadiusMode::derive(&op.compensation) != RadiusMode::None
            && !emitter.supports_radius_compensation()
        {
            out.warn(&format!(
                "{}: radius compensation not applied by {} emitter",
                op.label,
                emitter.name()
            ));
        }

        let ctx = OperationContext {
            label: op.label,
            commands: &parsed.commands,
            feed_xy: tool.and_then(|t| t.feed_xy_mmmin).map(|f| f as f64),
            feed_z: tool.and_then(|t| t.feed_z_mmmin).map(|f| f as f64),
            tool_radius,
            compensation: op.compensation,
            feed_scale: self.config.feed_scale,
            debug_comments: self.config.debug_comments,
        };

        if emitter.emit(&ctx, state, out) == EmitOutcome::Aborted {
            warn!(op = op.label, "operation aborted");
        }
    }

    fn emit_tool_change(&self, number: u32, state: &mut MachineState, out: &mut NcOutput) {
        debug!(tool = number, "tool change");

        // A height move means nothing to the control before the first TOOL CALL
        if state.tool_initialized {
            match format_signed_coordinate('Z', self.config.toolchange_z, 3) {
                Some(z) => out.push(format!("L  {}  FMAX", z)),
                None => warn!(z = self.config.toolchange_z, "tool change height not finite"),
            }
        }
        out.push("L  M5");
        out.push("L  M9");
        out.push("L  M6");

        match self.tools.get(Some(number)).and_then(|t| t.rpm).filter(|rpm| *rpm > 0) {
            Some(rpm) => out.push(format!("TOOL CALL {} Z S{}", number, rpm)),
            None => out.push(format!("TOOL CALL {} Z", number)),
        }
        state.tool_initialized = true;
        state.active_tool = Some(number);
        // Height after the change is up to the control
        state.z = None;

        out.push("L  M3");
        out.push("L  M8");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job(operations: &str) -> Job {
        Job::from_json(&format!(
            r#"{{
                "name": "TEST",
                "tools": [
                    {{"number": 1, "diameter": 6.0, "spindle_speed": 12000,
                      "horiz_feed": 10.0, "vert_feed": 3.333}},
                    {{"number": 2, "diameter": 5.0, "horiz_feed": 2.0, "vert_feed": 1.0}}
                ],
                "operations": {}
            }}"#,
            operations
        ))
        .unwrap()
    }

    #[test]
    fn test_numbering() {
        let program = NcProgram {
            name: "P".to_string(),
            lines: vec!["BEGIN PGM P MM".to_string(), "END PGM P MM".to_string()],
            diagnostics: Vec::new(),
        };
        assert_eq!(program.to_string(), "0 \n1 BEGIN PGM P MM\n2 END PGM P MM\n");
    }

    #[test]
    fn test_first_tool_change_without_retract() {
        let job = job(r#"[{"label": "Op", "tool": 1, "path": "G0 X0 Y0 Z5\n"}]"#);
        let program = ProgramGenerator::new(&job).generate("TEST").unwrap();

        assert_eq!(
            program.lines,
            vec![
                "BEGIN PGM TEST MM",
                "L  M5",
                "L  M9",
                "L  M6",
                "TOOL CALL 1 Z S12000",
                "L  M3",
                "L  M8",
                "L  Z+5.000  F9999",
                "L  X+0.000  Y+0.000  F9999",
                "END PGM TEST MM",
            ]
        );
    }

    #[test]
    fn test_second_tool_change_retracts() {
        let job = job(
            r#"[
                {"label": "A", "tool": 1, "path": "G0 X0 Y0\n"},
                {"label": "B", "tool": 1, "path": "G0 X1 Y0\n"},
                {"label": "C", "tool": 2, "path": "G0 X2 Y0\n"}
            ]"#,
        );
        let program = ProgramGenerator::new(&job).generate("TEST").unwrap();
        let calls: Vec<&String> = program
            .lines
            .iter()
            .filter(|l| l.starts_with("TOOL CALL"))
            .collect();

        assert_eq!(calls, vec!["TOOL CALL 1 Z S12000", "TOOL CALL 2 Z"]);
        assert_eq!(
            program.lines.iter().filter(|l| *l == "L  Z+150.000  FMAX").count(),
            1
        );
    }

    #[test]
    fn test_negative_toolchange_height() {
        let mut job = job(
            r#"[
                {"label": "A", "tool": 1, "path": "G0 X0 Y0\n"},
                {"label": "B", "tool": 2, "path": "G0 X1 Y0\n"}
            ]"#,
        );
        job.post.toolchange_z = -5.0;
        let program = ProgramGenerator::new(&job).generate("TEST").unwrap();

        assert!(program.lines.contains(&"L  Z-5.000  FMAX".to_string()));
        assert!(!program.lines.iter().any(|l| l.contains("Z+-")));
    }

    #[test]
    fn test_inactive_and_empty_operations_skipped() {
        let job = job(
            r#"[
                {"label": "Off", "tool": 1, "active": false, "path": "G0 X0 Y0\n"},
                {"label": "Empty", "tool": 1},
                {"label": "Blank", "tool": 1, "path": "  \n"}
            ]"#,
        );
        let program = ProgramGenerator::new(&job).generate("TEST").unwrap();

        assert_eq!(program.lines, vec!["BEGIN PGM TEST MM", "END PGM TEST MM"]);
    }

    #[test]
    fn test_parse_errors_embedded() {
        let job = job(r#"[{"label": "Op", "tool": 1, "path": "G0 X1 Y#\n"}]"#);
        let program = ProgramGenerator::new(&job).generate("TEST").unwrap();

        assert_eq!(program.diagnostics.len(), 1);
        assert!(program.lines[1].starts_with("; WARN: Op: "));
    }

    #[test]
    fn test_no_tools_is_fatal() {
        let job = Job::default();
        let err = ProgramGenerator::new(&job).generate("TEST").unwrap_err();
        assert!(matches!(err, PostError::Tools(ToolTableError::NoTools)));
    }

    #[test]
    fn test_compensation_warning_for_drilling() {
        let job = job(
            r#"[{"label": "Holes", "tool": 2, "side": "left",
                 "path": "G81 X1 Y1 Z-3 R2 F1\nG80\n"}]"#,
        );
        let program = ProgramGenerator::new(&job).generate("TEST").unwrap();

        assert!(program
            .lines
            .contains(&"; WARN: Holes: radius compensation not applied by drill emitter".to_string()));
    }

    #[test]
    fn test_generate_is_repeatable() {
        let job = job(r#"[{"label": "Op", "tool": 1, "path": "G0 X0 Y0 Z5\nG1 Z-1\nG1 X10\n"}]"#);
        let generator = ProgramGenerator::new(&job);

        let first = generator.generate("TEST").unwrap().to_string();
        let second = generator.generate("TEST").unwrap().to_string();
        assert_eq!(first, second);
    }
}
