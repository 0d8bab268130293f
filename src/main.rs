use anyhow::{Context, Result};
use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::Parser;
use std::fs;
use tracing::{info, warn};

use tncpost::codegen::{PathDiagnostic, ProgramGenerator};
use tncpost::config::Args;
use tncpost::job::Job;
use tncpost::validator::Validator;

fn main() -> Result<()> {
    let args = Args::parse();
    tncpost::init_logging(&args.log_level)?;

    let job = Job::load(&args.job)?;

    // Only an empty tool table stops the export; the rest is reported
    if let Err(errors) = Validator::new().validate_job(&job) {
        for err in errors {
            warn!("{}", err);
        }
    }

    let generator = ProgramGenerator::new(&job).with_config(args.post_config(&job));
    let name = args.program_name(&job);
    let program = generator.generate(&name)?;

    for diagnostic in &program.diagnostics {
        report(diagnostic);
    }

    match &args.output {
        Some(path) => {
            fs::write(path, program.to_string())
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "program written");
        }
        None => print!("{}", program),
    }

    if let Some(path) = args.tools_csv_path() {
        generator.tools().write_csv(&path)?;
        info!(path = %path.display(), tools = generator.tools().len(), "tool table written");
    }

    Ok(())
}

/// Print a path diagnostic against the operation's path text
fn report(diagnostic: &PathDiagnostic) {
    let id = diagnostic.operation.as_str();
    let span = diagnostic.error.span();

    let result = Report::build(ReportKind::Warning, id, span.start)
        .with_message(format!("path of operation '{}'", id))
        .with_label(
            Label::new((id, span))
                .with_message(diagnostic.error.to_string())
                .with_color(Color::Yellow),
        )
        .finish()
        .eprint((id, Source::from(diagnostic.source.clone())));

    if let Err(err) = result {
        warn!(%err, "failed to print diagnostic");
    }
}
