//! Front matter → database page properties.
//!
//! | Front matter | Property | Notes |
//! |--------------|----------|-------|
//! | (title) | `Name` title | property name configurable |
//! | `tags: "a, b"` / `tags: [a, b]` | `Tags` multi-select | ≤ 100 entries |
//! | string | rich text | ≤ 2000 chars, longer values are dropped |
//! | number | number | |
//! | bool | checkbox | |
//! | list of strings | multi-select | ≤ 100 entries |
//! | anything else | (omitted) | |
//!
//! Keys other than `title` and `tags` are title-cased: `due_date` becomes
//! `Due_Date`.

use serde_json::{json, Value};

use crate::frontmatter::{FrontMatter, FrontMatterValue};
use crate::render::plain_text;

/// Multi-select options the remote store accepts per property.
pub const MAX_MULTI_SELECT: usize = 100;
/// Longest string mapped to a rich-text property.
pub const MAX_RICH_TEXT: usize = 2000;

pub const TAGS_PROPERTY: &str = "Tags";

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Number(serde_json::Number),
    Checkbox(bool),
    MultiSelect(Vec<String>),
}

impl PropertyValue {
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Title(text) => json!({ "title": plain_text(text) }),
            PropertyValue::RichText(text) => json!({ "rich_text": plain_text(text) }),
            PropertyValue::Number(n) => json!({ "number": n }),
            PropertyValue::Checkbox(b) => json!({ "checkbox": b }),
            PropertyValue::MultiSelect(names) => json!({
                "multi_select": names.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>()
            }),
        }
    }
}

/// Page properties in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyMap {
    /// Insert unless `name` is already taken.
    fn insert(&mut self, name: String, value: PropertyValue) {
        if self.get(&name).is_some() {
            tracing::debug!("Skipping property '{}': name already in use", name);
            return;
        }
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// Build the page properties for a document.
pub fn map_properties(front_matter: &FrontMatter, title: &str, title_property: &str) -> PropertyMap {
    let mut properties = PropertyMap::default();
    properties.insert(
        title_property.to_string(),
        PropertyValue::Title(title.to_string()),
    );

    if let Some(tags) = front_matter.get("tags").and_then(tag_names) {
        if !tags.is_empty() {
            properties.insert(TAGS_PROPERTY.to_string(), PropertyValue::MultiSelect(tags));
        }
    }

    for (key, value) in front_matter.iter() {
        if key == "title" || key == "tags" {
            continue;
        }
        let mapped = match value {
            FrontMatterValue::String(s) if s.chars().count() <= MAX_RICH_TEXT => {
                Some(PropertyValue::RichText(s.clone()))
            }
            FrontMatterValue::Number(n) => Some(PropertyValue::Number(n.clone())),
            FrontMatterValue::Bool(b) => Some(PropertyValue::Checkbox(*b)),
            FrontMatterValue::List(items) => Some(PropertyValue::MultiSelect(
                items.iter().take(MAX_MULTI_SELECT).cloned().collect(),
            )),
            FrontMatterValue::String(_) | FrontMatterValue::Other(_) => None,
        };
        match mapped {
            Some(value) => properties.insert(title_case(key), value),
            None => tracing::debug!("Front matter key '{}' has no property mapping", key),
        }
    }

    properties
}

/// Tag names from a comma-separated string or a sequence.
fn tag_names(value: &FrontMatterValue) -> Option<Vec<String>> {
    let names: Vec<String> = match value {
        FrontMatterValue::String(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        FrontMatterValue::List(items) => items.iter().map(|t| t.trim().to_string()).collect(),
        FrontMatterValue::Other(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        FrontMatterValue::Number(_) | FrontMatterValue::Bool(_) | FrontMatterValue::Other(_) => {
            return None
        }
    };
    Some(
        names
            .into_iter()
            .filter(|t| !t.is_empty())
            .take(MAX_MULTI_SELECT)
            .collect(),
    )
}

/// Capitalize the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_word = false;
    for c in key.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm(yaml: &str) -> FrontMatter {
        FrontMatter::parse(yaml).unwrap()
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("due_date"), "Due_Date");
        assert_eq!(title_case("status"), "Status");
        assert_eq!(title_case("camelCase"), "Camelcase");
        assert_eq!(title_case("2nd-draft"), "2Nd-Draft");
    }

    #[test]
    fn title_and_comma_tags() {
        let props = map_properties(&fm("title: T\ntags: \"a, b\""), "T", "Name");
        assert_eq!(props.get("Name"), Some(&PropertyValue::Title("T".to_string())));
        assert_eq!(
            props.get("Tags"),
            Some(&PropertyValue::MultiSelect(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn empty_tags_are_dropped() {
        let props = map_properties(&fm("tags: \"a,, ,b,\""), "x", "Name");
        assert_eq!(
            props.get("Tags"),
            Some(&PropertyValue::MultiSelect(vec!["a".to_string(), "b".to_string()]))
        );

        let props = map_properties(&fm("tags: \" , \""), "x", "Name");
        assert!(props.get("Tags").is_none());
    }

    #[test]
    fn tags_are_capped() {
        let tags: Vec<String> = (0..150).map(|i| format!("t{}", i)).collect();
        let yaml = format!("tags: [{}]", tags.join(", "));
        let props = map_properties(&fm(&yaml), "x", "Name");
        match props.get("Tags") {
            Some(PropertyValue::MultiSelect(names)) => assert_eq!(names.len(), MAX_MULTI_SELECT),
            other => panic!("unexpected tags: {:?}", other),
        }
    }

    #[test]
    fn typed_values() {
        let yaml = "due_date: 2024-01-01\npriority: 3\ndone: true\naliases: [x, y]\nmeta: {a: 1}\nnothing: null";
        let props = map_properties(&fm(yaml), "x", "Name");
        assert_eq!(
            props.get("Due_Date"),
            Some(&PropertyValue::RichText("2024-01-01".to_string()))
        );
        assert_eq!(props.get("Priority"), Some(&PropertyValue::Number(3.into())));
        assert_eq!(props.get("Done"), Some(&PropertyValue::Checkbox(true)));
        assert_eq!(
            props.get("Aliases"),
            Some(&PropertyValue::MultiSelect(vec!["x".to_string(), "y".to_string()]))
        );
        assert!(props.get("Meta").is_none());
        assert!(props.get("Nothing").is_none());
    }

    #[test]
    fn long_strings_are_omitted() {
        let yaml = format!("summary: \"{}\"", "a".repeat(MAX_RICH_TEXT + 1));
        let props = map_properties(&fm(&yaml), "x", "Name");
        assert!(props.get("Summary").is_none());
    }

    #[test]
    fn custom_title_property_is_not_overwritten() {
        let props = map_properties(&fm("title_: other"), "Real", "Title_");
        assert_eq!(props.get("Title_"), Some(&PropertyValue::Title("Real".to_string())));
    }

    #[test]
    fn json_shape() {
        let props = map_properties(&fm("done: false"), "Doc", "Name");
        assert_eq!(
            props.to_json(),
            json!({
                "Name": { "title": [{ "type": "text", "text": { "content": "Doc" } }] },
                "Done": { "checkbox": false }
            })
        );
    }
}
