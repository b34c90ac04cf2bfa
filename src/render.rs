//! Block → Notion block JSON.
//!
//! The remote store caps a single rich-text object at 2000 characters, so
//! longer span text is split into consecutive objects with the same
//! annotations.

use serde_json::{json, Value};

use crate::blocks::{Block, FileKind, ListItem};
use crate::inline::InlineSpan;

/// Longest `text.content` the remote store accepts.
pub const MAX_TEXT_LENGTH: usize = 2000;

pub fn render_blocks(blocks: &[Block]) -> Vec<Value> {
    blocks.iter().map(render_block).collect()
}

pub fn render_block(block: &Block) -> Value {
    match block {
        Block::Heading { level, spans } => {
            let kind = format!("heading_{}", (*level).clamp(1, 3));
            typed(&kind, json!({ "rich_text": rich_text(spans) }))
        }
        Block::Paragraph { spans } => typed("paragraph", json!({ "rich_text": rich_text(spans) })),
        Block::Quote { spans } => typed("quote", json!({ "rich_text": rich_text(spans) })),
        Block::Code { language, text } => typed(
            "code",
            json!({
                "caption": [],
                "rich_text": plain_text(text),
                "language": language,
            }),
        ),
        Block::BulletedItem(item) => typed("bulleted_list_item", list_item(item)),
        Block::NumberedItem(item) => typed("numbered_list_item", list_item(item)),
        Block::File {
            kind,
            upload_id,
            caption,
        } => file_block(*kind, upload_id, caption.as_deref()),
        Block::MissingFile { name } => typed(
            "callout",
            json!({
                "rich_text": plain_text(&format!("⚠️ Missing file: {}", name)),
                "icon": { "emoji": "⚠️" },
                "color": "yellow",
            }),
        ),
    }
}

fn typed(kind: &str, body: Value) -> Value {
    let mut block = serde_json::Map::new();
    block.insert("type".to_string(), Value::String(kind.to_string()));
    block.insert(kind.to_string(), body);
    Value::Object(block)
}

fn list_item(item: &ListItem) -> Value {
    let mut body = json!({ "rich_text": rich_text(&item.spans) });
    let children: Vec<Value> = item
        .attachments
        .iter()
        .chain(item.children.iter())
        .map(render_block)
        .collect();
    if !children.is_empty() {
        body["children"] = Value::Array(children);
    }
    body
}

fn file_block(kind: FileKind, upload_id: &str, caption: Option<&str>) -> Value {
    let mut body = json!({
        "type": "file_upload",
        "file_upload": { "id": upload_id },
    });
    if let Some(caption) = caption.filter(|_| kind.takes_caption()) {
        body["caption"] = Value::Array(plain_text(caption));
    }
    typed(kind.as_str(), body)
}

/// Rich-text array for a sequence of spans.
pub fn rich_text(spans: &[InlineSpan]) -> Vec<Value> {
    spans.iter().flat_map(span_objects).collect()
}

/// Unannotated rich text, split at the length limit.
pub fn plain_text(text: &str) -> Vec<Value> {
    split_text(text)
        .into_iter()
        .map(|chunk| json!({ "type": "text", "text": { "content": chunk } }))
        .collect()
}

fn span_objects(span: &InlineSpan) -> Vec<Value> {
    split_text(span.text())
        .into_iter()
        .map(|chunk| {
            let mut object = json!({ "type": "text", "text": { "content": chunk } });
            match span {
                InlineSpan::Plain(_) => {}
                InlineSpan::Bold(_) => object["annotations"] = json!({ "bold": true }),
                InlineSpan::Italic(_) => object["annotations"] = json!({ "italic": true }),
                InlineSpan::Code(_) => object["annotations"] = json!({ "code": true }),
                InlineSpan::Link { url, .. } if is_absolute_url(url) => {
                    object["text"]["link"] = json!({ "url": url })
                }
                InlineSpan::Link { .. } => {}
            }
            object
        })
        .collect()
}

/// Links the remote store accepts; relative targets are rendered as plain text.
fn is_absolute_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Split on character boundaries into pieces of at most [`MAX_TEXT_LENGTH`].
fn split_text(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return vec![text];
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == MAX_TEXT_LENGTH {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&text[start..]);
    pieces
}
