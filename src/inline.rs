//! Inline formatting tokenizer.
//!
//! Turns one line of Markdown into a flat sequence of [`InlineSpan`]s.
//! Four span families are recognized, claimed in priority order:
//!
//! | Family | Syntax | Span |
//! |--------|--------|------|
//! | bold | `**x**` | [`InlineSpan::Bold`] |
//! | italic | `*x*` | [`InlineSpan::Italic`] |
//! | code | `` `x` `` | [`InlineSpan::Code`] |
//! | link | `[t](u)` | [`InlineSpan::Link`] |
//!
//! A later family only claims ranges no earlier match touches. Everything
//! left over becomes [`InlineSpan::Plain`], so the spans always cover the
//! whole line. Nesting is not supported: `**a *b* c**` is one bold span.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+?)\*").expect("valid italic regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+?)`").expect("valid code regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineSpan {
    Plain(String),
    Bold(String),
    Italic(String),
    Code(String),
    Link { text: String, url: String },
}

impl InlineSpan {
    /// Visible text of the span, without markers.
    pub fn text(&self) -> &str {
        match self {
            InlineSpan::Plain(t) | InlineSpan::Bold(t) | InlineSpan::Italic(t) | InlineSpan::Code(t) => t,
            InlineSpan::Link { text, .. } => text,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        InlineSpan::Plain(text.into())
    }
}

fn group(caps: &Captures<'_>, i: usize) -> String {
    caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
}

type SpanBuilder = fn(&Captures<'_>) -> InlineSpan;

/// Span families in claim order.
fn families() -> [(&'static Regex, SpanBuilder); 4] {
    [
        (&*BOLD_RE, |c| InlineSpan::Bold(group(c, 1))),
        (&*ITALIC_RE, |c| InlineSpan::Italic(group(c, 1))),
        (&*CODE_RE, |c| InlineSpan::Code(group(c, 1))),
        (&*LINK_RE, |c| InlineSpan::Link {
            text: group(c, 1),
            url: group(c, 2),
        }),
    ]
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Tokenize `line` into spans covering the whole input.
pub fn tokenize(line: &str) -> Vec<InlineSpan> {
    tokenize_with_ranges(line)
        .into_iter()
        .map(|(_, span)| span)
        .collect()
}

/// Like [`tokenize`], keeping the source byte range of every span.
pub(crate) fn tokenize_with_ranges(line: &str) -> Vec<(Range<usize>, InlineSpan)> {
    if line.is_empty() {
        return Vec::new();
    }

    let mut claimed: Vec<(Range<usize>, InlineSpan)> = Vec::new();
    for (re, build) in families() {
        let mut pos = 0;
        while pos < line.len() {
            let Some(caps) = re.captures_at(line, pos) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let range = whole.range();
            if claimed.iter().any(|(r, _)| overlaps(r, &range)) {
                // Retry from the next character so a later match is not lost.
                pos = range.start + line[range.start..].chars().next().map_or(1, char::len_utf8);
                continue;
            }
            pos = range.end.max(range.start + 1);
            claimed.push((range, build(&caps)));
        }
    }

    claimed.sort_by_key(|(r, _)| r.start);

    let mut spans = Vec::with_capacity(claimed.len() * 2 + 1);
    let mut cursor = 0;
    for (range, span) in claimed {
        if range.start > cursor {
            spans.push((cursor..range.start, InlineSpan::plain(&line[cursor..range.start])));
        }
        cursor = range.end;
        spans.push((range, span));
    }
    if cursor < line.len() {
        spans.push((cursor..line.len(), InlineSpan::plain(&line[cursor..])));
    }
    spans
}
