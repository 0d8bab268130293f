//! Heidenhain TNC post-processor
//!
//! Turns CAM path command streams into TNC 355 plain-language programs:
//! modal move elision, cutter radius compensation sequencing for contours
//! and grouped drilling cycles.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod job;
pub mod lexer;
pub mod parser;
pub mod post;
pub mod tool_library;
pub mod validator;

/// Initialize logging to stderr; stdout may carry the program.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
