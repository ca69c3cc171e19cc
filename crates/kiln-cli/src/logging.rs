//! Tracing setup for the kiln binary.
//!
//! Verbosity comes from the `--log-level` flag when given, otherwise from
//! the `KILN_LOG` environment variable (a full `EnvFilter` directive
//! string, so per-crate filtering such as `kiln_project=debug` works),
//! otherwise `info`. Log lines go to stderr; stdout stays reserved for
//! command output.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::LogLevel;

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(flag_directive(level)),
        None => EnvFilter::try_from_env("KILN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn flag_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
