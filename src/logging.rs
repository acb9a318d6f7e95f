//! Diagnostics via `tracing`, filtered by `RUST_LOG` (default `warn`).
//!
//! The terminal UI owns stdout and stderr, so it logs to a file or not at
//! all; the headless commands log to stderr.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub enum Sink<'a> {
    Stderr,
    File(&'a Path),
    Off,
}

pub fn init(sink: Sink<'_>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match sink {
        Sink::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init()
            .context("install stderr logger")?,
        Sink::File(path) => {
            let file = File::create(path)
                .with_context(|| format!("create log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .try_init()
                .context("install file logger")?
        }
        Sink::Off => {}
    }
    Ok(())
}
