//! File reference extraction.
//!
//! Three syntaxes point at local files:
//!
//! | Syntax | Example | Display name |
//! |--------|---------|--------------|
//! | Wiki embed | `![[photo.png\|Holiday]]` | text after `\|` |
//! | Markdown image | `![Holiday](img/photo.png)` | alt text |
//! | Markdown file link | `[Report](docs/report.pdf)` | link text |
//!
//! Each syntax is scanned independently and every match is kept, so the
//! same file may appear several times. Resolution and deduplication
//! happen later, in [`crate::assets`].

use regex::Regex;
use std::sync::LazyLock;

use crate::models::FileReference;

pub(crate) static EMBED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[([^|\]]+)(?:\|([^\]]+))?\]\]").expect("embed pattern is valid")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("image pattern is valid")
});

static FILE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[([^\]]+)\]\(([^)]+\.(?:pdf|doc|docx|zip|mp4|mov|mp3|wav))\)")
        .expect("file link pattern is valid")
});

/// Collect every file reference in `body`, in syntax order then text order.
pub fn extract_references(body: &str) -> Vec<FileReference> {
    let mut references = Vec::new();

    for caps in EMBED_RE.captures_iter(body) {
        let name = caps[1].trim();
        if name.is_empty() {
            continue;
        }
        let display = caps.get(2).map(|m| m.as_str().to_string());
        references.push(FileReference::new(name, display));
    }

    for caps in IMAGE_RE.captures_iter(body) {
        let target = caps[2].trim();
        if is_remote(target) {
            continue;
        }
        let alt = &caps[1];
        let display = (!alt.is_empty()).then(|| alt.to_string());
        references.push(FileReference::new(final_segment(target), display));
    }

    for caps in FILE_LINK_RE.captures_iter(body) {
        let target = caps[2].trim();
        if is_remote(target) {
            continue;
        }
        references.push(FileReference::new(
            final_segment(target),
            Some(caps[1].to_string()),
        ));
    }

    references
}

fn is_remote(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// Last `/`-separated segment of a link target.
fn final_segment(target: &str) -> &str {
    target
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(target)
}
