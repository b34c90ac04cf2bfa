//! Tracing setup for the `vmig` binary.
//!
//! Log lines go to stderr, so stdout only carries command output. `RUST_LOG`
//! overrides the default level unless `--verbose` is given. With
//! `--log-file` every event is also appended, without colors, to that file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives for a base level, keeping HTTP internals quiet.
pub fn filter_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{},hyper=info,reqwest=info,rustls=info", level)
}

pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new(filter_directives(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(false)))
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert!(filter_directives(true).starts_with("debug,"));
        assert!(filter_directives(false).starts_with("info,"));
    }

    #[test]
    fn directives_parse() {
        for verbose in [true, false] {
            assert!(EnvFilter::try_new(filter_directives(verbose)).is_ok());
        }
    }
}
