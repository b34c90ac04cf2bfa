//! Markdown body → structural blocks.
//!
//! The parser walks the body once with a single line cursor. Each branch
//! consumes exactly the lines it recognizes and leaves the cursor on the
//! first line it did not use:
//!
//! | Line (trimmed) | Block |
//! |----------------|-------|
//! | blank | skipped |
//! | ```` ```lang ```` | [`Block::Code`] up to the closing fence |
//! | `#`, `##`, `###`… | [`Block::Heading`] (level capped at 3) |
//! | `- x`, `* x`, `1. x` | list items, nested by indentation |
//! | `> x` | [`Block::Quote`] |
//! | contains `![[…]]` | paragraphs interleaved with file blocks |
//! | anything else | [`Block::Paragraph`] |
//!
//! This is a fixed subset of Markdown, not CommonMark. Multi-line quotes,
//! tables and setext headings come out as paragraphs.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::assets::AssetMap;
use crate::inline::{tokenize, InlineSpan};
use crate::references::EMBED_RE;

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+").expect("valid numbered item regex"));

/// How the remote store should present an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Pdf,
    File,
}

impl FileKind {
    /// Infer the kind from the extension of `name`.
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => FileKind::Image,
            "mp4" | "mov" | "avi" | "mkv" | "webm" => FileKind::Video,
            "mp3" | "wav" | "ogg" | "m4a" | "flac" => FileKind::Audio,
            "pdf" => FileKind::Pdf,
            _ => FileKind::File,
        }
    }

    /// Block type name used by the remote store.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Pdf => "pdf",
            FileKind::File => "file",
        }
    }

    /// Only these block types accept a caption.
    pub fn takes_caption(&self) -> bool {
        matches!(self, FileKind::Image | FileKind::Pdf | FileKind::File)
    }
}

/// One bulleted or numbered list item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListItem {
    pub spans: Vec<InlineSpan>,
    /// File blocks for embeds written on the item's own line.
    pub attachments: Vec<Block>,
    /// Nested list items.
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<InlineSpan> },
    Paragraph { spans: Vec<InlineSpan> },
    Quote { spans: Vec<InlineSpan> },
    Code { language: String, text: String },
    BulletedItem(ListItem),
    NumberedItem(ListItem),
    File {
        kind: FileKind,
        upload_id: String,
        caption: Option<String>,
    },
    MissingFile { name: String },
}

/// Names of all missing-file blocks, including those inside list items.
pub fn missing_files(blocks: &[Block]) -> Vec<String> {
    let mut names = Vec::new();
    collect_missing(blocks, &mut names);
    names
}

fn collect_missing(blocks: &[Block], names: &mut Vec<String>) {
    for block in blocks {
        match block {
            Block::MissingFile { name } => names.push(name.clone()),
            Block::BulletedItem(item) | Block::NumberedItem(item) => {
                collect_missing(&item.attachments, names);
                collect_missing(&item.children, names);
            }
            _ => {}
        }
    }
}

/// Languages the remote store highlights.
const CODE_LANGUAGES: &[&str] = &[
    "abap", "arduino", "bash", "basic", "c", "clojure", "coffeescript", "c++", "c#", "css",
    "dart", "diff", "docker", "elixir", "elm", "erlang", "flow", "fortran", "f#", "gherkin",
    "glsl", "go", "graphql", "groovy", "haskell", "html", "java", "javascript", "json", "julia",
    "kotlin", "latex", "less", "lisp", "livescript", "lua", "makefile", "markdown", "markup",
    "matlab", "mermaid", "nix", "objective-c", "ocaml", "pascal", "perl", "php", "plain text",
    "powershell", "prolog", "protobuf", "python", "r", "reason", "ruby", "rust", "sass", "scala",
    "scheme", "scss", "shell", "sql", "swift", "typescript", "vb.net", "verilog", "vhdl",
    "visual basic", "webassembly", "xml", "yaml", "java/c/c++/c#",
];

/// Map a fence language onto one the remote store accepts.
pub fn normalize_language(language: &str) -> String {
    let lang = language.trim().to_lowercase();
    let mapped = match lang.as_str() {
        "" | "text" | "txt" | "cardlink" => "plain text",
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "md" => "markdown",
        "yml" => "yaml",
        "sh" | "bash" | "zsh" | "fish" => "shell",
        "rs" => "rust",
        "cpp" => "c++",
        "cs" => "c#",
        "golang" => "go",
        "rb" => "ruby",
        "kt" => "kotlin",
        "dockerfile" => "docker",
        other => other,
    };
    if CODE_LANGUAGES.contains(&mapped) {
        mapped.to_string()
    } else {
        "plain text".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
}

/// Split a trimmed line into its list marker kind and item text.
fn list_marker(trimmed: &str) -> Option<(ListKind, &str)> {
    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        return Some((ListKind::Bulleted, rest.trim()));
    }
    NUMBERED_RE
        .find(trimmed)
        .map(|m| (ListKind::Numbered, trimmed[m.end()..].trim()))
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Convert a document body into blocks, wiring embeds to uploaded assets.
pub fn parse_blocks(body: &str, assets: &AssetMap) -> Vec<Block> {
    let lines: Vec<&str> = body.lines().collect();
    let mut parser = BlockParser {
        lines: &lines,
        pos: 0,
        assets,
    };
    parser.parse()
}

struct BlockParser<'a> {
    lines: &'a [&'a str],
    pos: usize,
    assets: &'a AssetMap,
}

impl<'a> BlockParser<'a> {
    fn parse(&mut self) -> Vec<Block> {
        let lines = self.lines;
        let mut blocks = Vec::new();
        while let Some(raw) = lines.get(self.pos) {
            let line = raw.trim();
            if line.is_empty() {
                self.pos += 1;
            } else if let Some(fence) = line.strip_prefix("```") {
                self.pos += 1;
                blocks.push(self.code_block(fence));
            } else if line.starts_with('#') {
                self.pos += 1;
                blocks.push(heading(line));
            } else if list_marker(line).is_some() {
                blocks.extend(self.list());
            } else if let Some(quote) = line.strip_prefix('>') {
                self.pos += 1;
                blocks.push(Block::Quote {
                    spans: tokenize(quote.trim()),
                });
            } else if line.contains("![[") {
                self.pos += 1;
                blocks.extend(self.embed_line(line));
            } else {
                self.pos += 1;
                blocks.push(Block::Paragraph {
                    spans: tokenize(line),
                });
            }
        }
        blocks
    }

    /// Cursor is on the first line after the opening fence.
    fn code_block(&mut self, fence: &str) -> Block {
        let lines = self.lines;
        let mut code = Vec::new();
        while let Some(raw) = lines.get(self.pos) {
            self.pos += 1;
            if raw.trim().starts_with("```") {
                break;
            }
            code.push(*raw);
        }
        Block::Code {
            language: normalize_language(fence),
            text: code.join("\n"),
        }
    }

    /// A run of top-level items, ending at a blank or non-item line.
    fn list(&mut self) -> Vec<Block> {
        let lines = self.lines;
        let mut items = Vec::new();
        while let Some(raw) = lines.get(self.pos) {
            let Some((kind, text)) = list_marker(raw.trim()) else {
                break;
            };
            self.pos += 1;
            items.push(self.list_item(kind, text, indent_of(raw)));
        }
        items
    }

    fn list_item(&mut self, kind: ListKind, text: &'a str, indent: usize) -> Block {
        let (spans, attachments) = self.item_content(text);
        let children = self.nested_items(indent);
        let item = ListItem {
            spans,
            attachments,
            children,
        };
        match kind {
            ListKind::Bulleted => Block::BulletedItem(item),
            ListKind::Numbered => Block::NumberedItem(item),
        }
    }

    /// Items indented deeper than `parent_indent`, directly after the parent.
    fn nested_items(&mut self, parent_indent: usize) -> Vec<Block> {
        let lines = self.lines;
        let mut children = Vec::new();
        let mut consumed = self.pos;
        while let Some(raw) = lines.get(self.pos) {
            if raw.trim().is_empty() {
                self.pos += 1;
                continue;
            }
            let indent = indent_of(raw);
            if indent <= parent_indent {
                break;
            }
            let Some((kind, text)) = list_marker(raw.trim()) else {
                break;
            };
            self.pos += 1;
            children.push(self.list_item(kind, text, indent));
            consumed = self.pos;
        }
        // Blank lines after the last nested item belong to the caller.
        self.pos = consumed;
        children
    }

    /// Item text without embed markers, plus a block per embed.
    fn item_content(&self, text: &str) -> (Vec<InlineSpan>, Vec<Block>) {
        if !text.contains("![[") {
            return (tokenize(text), Vec::new());
        }
        let stripped = EMBED_RE.replace_all(text, "");
        let attachments = EMBED_RE
            .captures_iter(text)
            .map(|caps| {
                let display = caps.get(2).map(|m| m.as_str().to_string());
                self.file_block(caps[1].trim(), display)
            })
            .collect();
        (tokenize(stripped.trim()), attachments)
    }

    /// Split a line on embeds: text between them becomes paragraphs.
    fn embed_line(&self, line: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut cursor = 0;
        for caps in EMBED_RE.captures_iter(line) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            self.push_paragraph(&line[cursor..whole.start()], &mut blocks);
            let display = caps.get(2).map(|m| m.as_str().to_string());
            blocks.push(self.file_block(caps[1].trim(), display));
            cursor = whole.end();
        }
        self.push_paragraph(&line[cursor..], &mut blocks);
        blocks
    }

    fn push_paragraph(&self, text: &str, blocks: &mut Vec<Block>) {
        let text = text.trim();
        if !text.is_empty() {
            blocks.push(Block::Paragraph {
                spans: tokenize(text),
            });
        }
    }

    fn file_block(&self, name: &str, caption: Option<String>) -> Block {
        match self.assets.lookup(name) {
            Some(upload_id) => Block::File {
                kind: FileKind::from_name(name),
                upload_id: upload_id.to_string(),
                caption,
            },
            None => {
                tracing::debug!("No upload for embed: {}", name);
                Block::MissingFile {
                    name: name.to_string(),
                }
            }
        }
    }
}

fn heading(line: &str) -> Block {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    let text = line[hashes..].trim();
    Block::Heading {
        level: hashes.min(3) as u8,
        spans: if text.is_empty() {
            Vec::new()
        } else {
            vec![InlineSpan::plain(text)]
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetRecord;
    use std::path::PathBuf;

    fn assets(names: &[(&str, &str)]) -> AssetMap {
        let root = Path::new("/vault");
        let mut map = AssetMap::new();
        for (name, id) in names {
            let record = AssetRecord {
                path: PathBuf::from("/vault/attachments").join(name),
                name: name.to_string(),
                size: 1,
                mime_type: "application/octet-stream".to_string(),
                hash: format!("hash-{}", name),
            };
            map.insert(&record, root, id);
        }
        map
    }

    fn plain(text: &str) -> Vec<InlineSpan> {
        vec![InlineSpan::plain(text)]
    }

    fn item(text: &str, children: Vec<Block>) -> ListItem {
        ListItem {
            spans: plain(text),
            attachments: Vec::new(),
            children,
        }
    }

    #[test]
    fn headings_paragraphs_and_quotes() {
        let body = "# Title\n\n## Sub **x**\n#### Deep\nSome *text*.\n> quoted **bit**";
        let blocks = parse_blocks(body, &AssetMap::new());
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    spans: plain("Title")
                },
                Block::Heading {
                    level: 2,
                    spans: plain("Sub **x**")
                },
                Block::Heading {
                    level: 3,
                    spans: plain("Deep")
                },
                Block::Paragraph {
                    spans: vec![
                        InlineSpan::plain("Some "),
                        InlineSpan::Italic("text".to_string()),
                        InlineSpan::plain("."),
                    ]
                },
                Block::Quote {
                    spans: vec![
                        InlineSpan::plain("quoted "),
                        InlineSpan::Bold("bit".to_string()),
                    ]
                },
            ]
        );
    }

    #[test]
    fn code_fence_keeps_raw_lines() {
        let body = "```py\n  x = 1\n\n# not a heading\n```\nafter";
        let blocks = parse_blocks(body, &AssetMap::new());
        assert_eq!(
            blocks,
            vec![
                Block::Code {
                    language: "python".to_string(),
                    text: "  x = 1\n\n# not a heading".to_string(),
                },
                Block::Paragraph {
                    spans: plain("after")
                },
            ]
        );
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let blocks = parse_blocks("```\na\nb", &AssetMap::new());
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: "plain text".to_string(),
                text: "a\nb".to_string()
            }]
        );
    }

    #[test]
    fn language_normalization() {
        assert_eq!(normalize_language("js"), "javascript");
        assert_eq!(normalize_language("TSX"), "typescript");
        assert_eq!(normalize_language("zsh"), "shell");
        assert_eq!(normalize_language("cardlink"), "plain text");
        assert_eq!(normalize_language("Rust"), "rust");
        assert_eq!(normalize_language("brainfuck"), "plain text");
        assert_eq!(normalize_language(""), "plain text");
    }

    #[test]
    fn nested_list_fidelity() {
        let body = "- a\n    - b\n        - c\n    - d\n- e";
        let blocks = parse_blocks(body, &AssetMap::new());
        assert_eq!(
            blocks,
            vec![
                Block::BulletedItem(item(
                    "a",
                    vec![
                        Block::BulletedItem(item(
                            "b",
                            vec![Block::BulletedItem(item("c", vec![]))]
                        )),
                        Block::BulletedItem(item("d", vec![])),
                    ]
                )),
                Block::BulletedItem(item("e", vec![])),
            ]
        );
    }

    #[test]
    fn nesting_ignores_marker_type() {
        let body = "1. one\n   - sub\n2. two";
        let blocks = parse_blocks(body, &AssetMap::new());
        assert_eq!(
            blocks,
            vec![
                Block::NumberedItem(item("one", vec![Block::BulletedItem(item("sub", vec![]))])),
                Block::NumberedItem(item("two", vec![])),
            ]
        );
    }

    #[test]
    fn blank_lines_inside_nested_region_are_skipped() {
        let body = "- a\n\n  - b\n\nnext paragraph";
        let blocks = parse_blocks(body, &AssetMap::new());
        assert_eq!(
            blocks,
            vec![
                Block::BulletedItem(item("a", vec![Block::BulletedItem(item("b", vec![]))])),
                Block::Paragraph {
                    spans: plain("next paragraph")
                },
            ]
        );
    }

    #[test]
    fn indented_text_ends_nested_region() {
        let body = "- a\n  continuation\n- b";
        let blocks = parse_blocks(body, &AssetMap::new());
        assert_eq!(
            blocks,
            vec![
                Block::BulletedItem(item("a", vec![])),
                Block::Paragraph {
                    spans: plain("continuation")
                },
                Block::BulletedItem(item("b", vec![])),
            ]
        );
    }

    #[test]
    fn embeds_on_item_line_become_attachments() {
        let map = assets(&[("pic.png", "up-1")]);
        let body = "- see ![[pic.png|Holiday]] and ![[gone.pdf]]\n    - child";
        let blocks = parse_blocks(body, &map);
        assert_eq!(
            blocks,
            vec![Block::BulletedItem(ListItem {
                spans: plain("see  and"),
                attachments: vec![
                    Block::File {
                        kind: FileKind::Image,
                        upload_id: "up-1".to_string(),
                        caption: Some("Holiday".to_string()),
                    },
                    Block::MissingFile {
                        name: "gone.pdf".to_string()
                    },
                ],
                children: vec![Block::BulletedItem(item("child", vec![]))],
            })]
        );
        assert_eq!(missing_files(&blocks), vec!["gone.pdf".to_string()]);
    }

    #[test]
    fn embed_line_splits_into_paragraphs_and_files() {
        let map = assets(&[("clip.mp4", "up-2")]);
        let body = "before ![[clip.mp4]] after ![[missing.png]]";
        let blocks = parse_blocks(body, &map);
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph {
                    spans: plain("before")
                },
                Block::File {
                    kind: FileKind::Video,
                    upload_id: "up-2".to_string(),
                    caption: None,
                },
                Block::Paragraph {
                    spans: plain("after")
                },
                Block::MissingFile {
                    name: "missing.png".to_string()
                },
            ]
        );
    }

    #[test]
    fn embed_resolves_by_relative_path() {
        let map = assets(&[("doc.pdf", "up-3")]);
        let blocks = parse_blocks("![[attachments/doc.pdf]]", &map);
        assert_eq!(
            blocks,
            vec![Block::File {
                kind: FileKind::Pdf,
                upload_id: "up-3".to_string(),
                caption: None,
            }]
        );
    }

    #[test]
    fn file_kinds() {
        assert_eq!(FileKind::from_name("a.PNG"), FileKind::Image);
        assert_eq!(FileKind::from_name("a.webm"), FileKind::Video);
        assert_eq!(FileKind::from_name("a.flac"), FileKind::Audio);
        assert_eq!(FileKind::from_name("a.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_name("a.zip"), FileKind::File);
        assert_eq!(FileKind::from_name("noext"), FileKind::File);
    }
}
