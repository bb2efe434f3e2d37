//! Logging setup for bmcctl.
//!
//! The binary calls [`init_journald_or_stderr`] once at startup. Library
//! code logs through `use crate::tracing::prelude::*`, which brings in the
//! `trace!()` .. `error!()` macros: frames at trace, sequencing decisions at
//! debug, swallowed cleanup failures at warn.
//!
//! Stdout is never used, since it carries command output such as the JSON
//! power supply reading.

use std::{env, io};
use time::{macros::format_description, OffsetDateTime};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Level used when neither `RUST_LOG` nor `-v` says otherwise
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::WARN;

/// Default level after `verbose` repetitions of `-v`.
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => DEFAULT_LEVEL,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to journald; otherwise to
/// stderr. `RUST_LOG` directives override `level`.
pub fn init_journald_or_stderr(level: LevelFilter) {
    if env::var_os("JOURNAL_STREAM").is_none() {
        init_stderr(level);
        return;
    }

    match tracing_journald::layer() {
        Ok(journald) => tracing_subscriber::registry()
            .with(env_filter(level))
            .with(journald)
            .init(),
        Err(e) => {
            init_stderr(level);
            warn!(error = %e, "journald unavailable, logging to stderr");
        }
    }
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn init_stderr(level: LevelFilter) {
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_timer(LocalTimer);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt)
        .init();
}

/// `HH:MM:SS` in local time, UTC when the offset is unknown.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now
            .format(format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{}", stamp)
    }
}
