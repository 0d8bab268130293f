//! Command-line configuration
//!
//! Handles:
//! - Command-line argument parsing
//! - Overriding the job's post settings
//! - Program name and tool table path resolution

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::job::{Job, PostConfig};

/// Name used when neither the command line, the output file nor the job has one
pub const DEFAULT_PROGRAM_NAME: &str = "PROGRAM";

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "tncpost")]
#[command(about = "Post-process a CAM job into a Heidenhain TNC plain-language program")]
#[command(version)]
pub struct Args {
    /// Job description (JSON)
    pub job: PathBuf,

    /// Output program; stdout when absent
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Program name for BEGIN PGM / END PGM")]
    pub name: Option<String>,

    #[arg(long, help = "Tool table CSV path (default: <output stem>_tools.csv)")]
    pub tools_csv: Option<PathBuf>,

    #[arg(long, conflicts_with = "tools_csv", help = "Do not write the tool table CSV")]
    pub no_tools_csv: bool,

    #[arg(long, help = "Retract height before a tool change, mm")]
    pub toolchange_z: Option<f64>,

    #[arg(long, help = "Write (DEBUG ...) lines for contour decisions")]
    pub debug_comments: bool,

    #[arg(
        long,
        default_value = "warn",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

impl Args {
    /// Job settings with command-line overrides applied
    pub fn post_config(&self, job: &Job) -> PostConfig {
        let mut config = job.post.clone();
        if let Some(z) = self.toolchange_z {
            config.toolchange_z = z;
        }
        if self.debug_comments {
            config.debug_comments = true;
        }
        config
    }

    pub fn program_name(&self, job: &Job) -> String {
        self.name
            .clone()
            .or_else(|| self.output.as_deref().and_then(file_stem))
            .or_else(|| job.name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string())
    }

    /// Where to write the tool table, if anywhere
    pub fn tools_csv_path(&self) -> Option<PathBuf> {
        if self.no_tools_csv {
            return None;
        }
        if let Some(path) = &self.tools_csv {
            return Some(path.clone());
        }
        let output = self.output.as_deref()?;
        let stem = file_stem(output)?;
        Some(output.with_file_name(format!("{}_tools.csv", stem)))
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}
