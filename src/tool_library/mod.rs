//! Tool table - tool controllers from the job, keyed by tool number
//!
//! Controllers carry feeds in mm/s as exported by the CAM job; the table holds
//! the values the program needs (rpm, feeds in mm/min) and writes the
//! semicolon CSV the machine operator uses to set up the magazine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// mm/s to mm/min
pub const MMPS_TO_MMMIN: f64 = 60.0;

const CSV_HEADER: &str = "ToolNumber;Label;Diameter_mm;Spindle_rpm;FeedXY_mmmin;FeedZ_mmmin";

#[derive(Error, Debug)]
pub enum ToolTableError {
    #[error("no tools found: the job must contain tool controllers with a tool number")]
    NoTools,

    #[error("failed to write tool table {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Tool controller definition from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolControllerDef {
    /// Tool number (T-number), the key used by operations
    #[serde(alias = "tool_number")]
    pub number: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// mm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<f64>,

    /// rpm
    #[serde(default, alias = "rpm", skip_serializing_if = "Option::is_none")]
    pub spindle_speed: Option<f64>,

    /// mm/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horiz_feed: Option<f64>,

    /// mm/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vert_feed: Option<f64>,
}

/// Resolved tool data in program units
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub number: u32,
    pub label: String,
    pub diameter: Option<f64>,
    pub rpm: Option<i64>,
    pub feed_xy_mmmin: Option<i64>,
    pub feed_z_mmmin: Option<i64>,
}

impl ToolInfo {
    /// `feed_scale` converts controller feeds to program feeds
    pub fn from_controller(def: &ToolControllerDef, feed_scale: f64) -> Self {
        let label = def
            .label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("Tool{}", def.number));

        Self {
            number: def.number,
            label,
            diameter: def.diameter.filter(|d| d.is_finite()),
            rpm: def.spindle_speed.and_then(round_finite),
            feed_xy_mmmin: def.horiz_feed.and_then(|f| round_finite(f * feed_scale)),
            feed_z_mmmin: def.vert_feed.and_then(|f| round_finite(f * feed_scale)),
        }
    }

    pub fn radius(&self) -> Option<f64> {
        self.diameter.map(|d| d / 2.0)
    }

    fn csv_row(&self) -> String {
        [
            self.number.to_string(),
            self.label.replace(';', ","),
            opt_field(self.diameter),
            opt_field(self.rpm),
            opt_field(self.feed_xy_mmmin),
            opt_field(self.feed_z_mmmin),
        ]
        .join(";")
    }
}

fn round_finite(v: f64) -> Option<i64> {
    v.is_finite().then(|| v.round() as i64)
}

fn opt_field<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Tool table - collection of tools by number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolTable {
    pub tools: BTreeMap<u32, ToolInfo>,
}

impl ToolTable {
    /// Build from controllers. A repeated number keeps the last definition.
    pub fn from_controllers(controllers: &[ToolControllerDef], feed_scale: f64) -> Self {
        let tools = controllers
            .iter()
            .map(|def| (def.number, ToolInfo::from_controller(def, feed_scale)))
            .collect();
        Self { tools }
    }

    /// Lookup; a miss (or no tool number at all) is not an error
    pub fn get(&self, number: Option<u32>) -> Option<&ToolInfo> {
        number.and_then(|n| self.tools.get(&n))
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn ensure_not_empty(&self) -> Result<(), ToolTableError> {
        if self.is_empty() {
            Err(ToolTableError::NoTools)
        } else {
            Ok(())
        }
    }

    /// Semicolon CSV, sorted by tool number
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        csv.push('\n');
        for tool in self.tools.values() {
            csv.push_str(&tool.csv_row());
            csv.push('\n');
        }
        csv
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ToolTableError> {
        let wrap = |source| ToolTableError::Write {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::create(path).map_err(wrap)?;
        file.write_all(self.to_csv().as_bytes()).map_err(wrap)
    }
}
