//! Migration progress reporting.
//!
//! `vmig migrate` reports which phase is running and how far along it is.
//! Everything goes to **stderr**; stdout carries only the summary.
//!
//! ```text
//! migrate  discovering...
//! migrate  analyzing  12 files
//! migrate  uploading  3 / 12 files
//! migrate  writing  40 / 1,250 pages
//! ```
//!
//! With `--progress json` each event is one JSON object per line:
//! `{"event":"progress","phase":"uploading","n":3,"total":12}`.

use serde_json::{json, Value};
use std::io::Write;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationProgressEvent {
    /// Walking the vault. Total unknown.
    Discovering,
    /// Referenced files found and hashed.
    Analyzing { assets: u64 },
    /// `n` uploads finished out of `total`.
    Uploading { n: u64, total: u64 },
    /// `n` documents written out of `total`.
    Writing { n: u64, total: u64 },
}

impl MigrationProgressEvent {
    fn phase(&self) -> &'static str {
        match self {
            MigrationProgressEvent::Discovering => "discovering",
            MigrationProgressEvent::Analyzing { .. } => "analyzing",
            MigrationProgressEvent::Uploading { .. } => "uploading",
            MigrationProgressEvent::Writing { .. } => "writing",
        }
    }

    pub fn human_line(&self) -> String {
        let phase = self.phase();
        match self {
            MigrationProgressEvent::Discovering => format!("migrate  {}...", phase),
            MigrationProgressEvent::Analyzing { assets } => {
                format!("migrate  {}  {} files", phase, group_digits(*assets))
            }
            MigrationProgressEvent::Uploading { n, total } => format!(
                "migrate  {}  {} / {} files",
                phase,
                group_digits(*n),
                group_digits(*total)
            ),
            MigrationProgressEvent::Writing { n, total } => format!(
                "migrate  {}  {} / {} pages",
                phase,
                group_digits(*n),
                group_digits(*total)
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = json!({ "event": "progress", "phase": self.phase() });
        match self {
            MigrationProgressEvent::Discovering => {}
            MigrationProgressEvent::Analyzing { assets } => obj["assets"] = json!(assets),
            MigrationProgressEvent::Uploading { n, total }
            | MigrationProgressEvent::Writing { n, total } => {
                obj["n"] = json!(n);
                obj["total"] = json!(total);
            }
        }
        obj
    }
}

pub trait MigrationProgressReporter: Send + Sync {
    fn report(&self, event: MigrationProgressEvent);
}

fn emit(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
    let _ = stderr.flush();
}

pub struct StderrProgress;

impl MigrationProgressReporter for StderrProgress {
    fn report(&self, event: MigrationProgressEvent) {
        emit(&event.human_line());
    }
}

pub struct JsonProgress;

impl MigrationProgressReporter for JsonProgress {
    fn report(&self, event: MigrationProgressEvent) {
        emit(&event.to_json().to_string());
    }
}

pub struct NoProgress;

impl MigrationProgressReporter for NoProgress {
    fn report(&self, _event: MigrationProgressEvent) {}
}

/// `1234567` → `"1,234,567"`.
fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `--progress` values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human when stderr is a terminal, off when it is piped.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn MigrationProgressReporter> {
        match self {
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
            ProgressMode::Off => Box::new(NoProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_grouping() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(123_456), "123,456");
        assert_eq!(group_digits(1_234_567), "1,234,567");
    }

    #[test]
    fn human_lines() {
        assert_eq!(
            MigrationProgressEvent::Discovering.human_line(),
            "migrate  discovering..."
        );
        assert_eq!(
            MigrationProgressEvent::Writing { n: 40, total: 1250 }.human_line(),
            "migrate  writing  40 / 1,250 pages"
        );
    }

    #[test]
    fn json_events() {
        let upload = MigrationProgressEvent::Uploading { n: 3, total: 12 }.to_json();
        assert_eq!(
            upload,
            json!({ "event": "progress", "phase": "uploading", "n": 3, "total": 12 })
        );
        let analyze = MigrationProgressEvent::Analyzing { assets: 5 }.to_json();
        assert_eq!(analyze["assets"], 5);
        assert!(MigrationProgressEvent::Discovering.to_json().get("n").is_none());
    }
}
