use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::job::{Job, Operation, MAX_CHAIN_DEPTH};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("no tools found: the job must contain tool controllers with a tool number")]
    NoTools,

    #[error("tool number {number} is defined {count} times")]
    DuplicateTool { number: u32, count: usize },

    #[error("tool {number} has invalid diameter {diameter}")]
    ToolDiameter { number: u32, diameter: f64 },

    #[error("operation '{op}': base '{base}' is not an operation of this job")]
    UnknownBase { op: String, base: String },

    #[error("operation '{op}': base chain loops back or exceeds {} links", MAX_CHAIN_DEPTH)]
    BaseCycle { op: String },

    #[error("operation '{op}': clearance height {clearance} is below safe height {safe}")]
    Heights { op: String, safe: f64, clearance: f64 },
}

#[derive(Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_job(&self, job: &Job) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.validate_tools(job);

        let labels: HashSet<&str> = job.operations.iter().map(|o| o.label.as_str()).collect();
        for op in &job.operations {
            if let Err(e) = self.validate_operation(job, &labels, op) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_tools(&self, job: &Job) -> Vec<ValidationError> {
        if job.tools.is_empty() {
            return vec![ValidationError::NoTools];
        }

        let mut errors = Vec::new();
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for tool in &job.tools {
            *counts.entry(tool.number).or_default() += 1;
            if let Some(diameter) = tool.diameter {
                if !(diameter > 0.0) {
                    errors.push(ValidationError::ToolDiameter {
                        number: tool.number,
                        diameter,
                    });
                }
            }
        }

        let mut duplicates: Vec<(u32, usize)> =
            counts.into_iter().filter(|(_, count)| *count > 1).collect();
        duplicates.sort_unstable();
        errors.extend(
            duplicates
                .into_iter()
                .map(|(number, count)| ValidationError::DuplicateTool { number, count }),
        );
        errors
    }

    fn validate_operation(
        &self,
        job: &Job,
        labels: &HashSet<&str>,
        op: &Operation,
    ) -> Result<(), ValidationError> {
        let chain = job.resolve_chain(op);
        if let Some(last) = chain.last() {
            if let Some(base) = &last.base {
                if !labels.contains(base.as_str()) {
                    return Err(ValidationError::UnknownBase {
                        op: op.label.clone(),
                        base: base.clone(),
                    });
                }
                // The walk stopped on a known base: it looped or ran too deep
                return Err(ValidationError::BaseCycle {
                    op: op.label.clone(),
                });
            }
        }

        let resolved = job.resolve(op);
        if resolved.clearance_height < resolved.safe_height {
            return Err(ValidationError::Heights {
                op: op.label.clone(),
                safe: resolved.safe_height,
                clearance: resolved.clearance_height,
            });
        }
        Ok(())
    }
}
