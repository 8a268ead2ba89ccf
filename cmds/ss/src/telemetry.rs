//! Logging setup.
//!
//! Logs go to stderr; stdout is reserved for the generated manifests.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Names accepted by `--log-level`.
pub const LEVEL_NAMES: &[&str] = &["disabled", "fatal", "error", "warn", "info", "debug", "trace"];

/// Parse a `--log-level` value into a level filter.
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
	match level.to_lowercase().as_str() {
		"disabled" | "off" => Ok(LevelFilter::OFF),
		"trace" => Ok(LevelFilter::TRACE),
		"debug" => Ok(LevelFilter::DEBUG),
		"info" => Ok(LevelFilter::INFO),
		"warn" | "warning" => Ok(LevelFilter::WARN),
		"error" | "fatal" => Ok(LevelFilter::ERROR),
		_ => Err(format!(
			"unknown log level {level}, expected one of: {}",
			LEVEL_NAMES.join(", ")
		)),
	}
}

/// Initialize tracing with the given log level.
///
/// Priority for log level:
/// 1. `log_level` argument (from --log-level CLI flag)
/// 2. `RUST_LOG` environment variable
/// 3. Default: info
///
/// Output is pretty-printed when stderr is a terminal and JSON otherwise.
pub fn init(log_level: Option<LevelFilter>) -> Result<()> {
	let filter_layer = match log_level {
		Some(level) => EnvFilter::new(level.to_string()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	};

	let fmt_layer = if std::io::stderr().is_terminal() {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.pretty()
			.boxed()
	} else {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.boxed()
	};

	tracing_subscriber::registry()
		.with(filter_layer)
		.with(fmt_layer)
		.try_init()
		.context("failed to install tracing subscriber")
}
