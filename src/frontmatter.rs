//! YAML front matter splitting and typing.
//!
//! A document whose first line is `---` carries a metadata header that ends
//! at the next `---` line. The header is parsed with `serde_yaml` and each
//! value is narrowed to a [`FrontMatterValue`], so downstream code matches
//! on a closed set of shapes instead of inspecting YAML at runtime.

use serde::Serialize;
use serde_yaml::Value as YamlValue;

/// A front matter value narrowed to the shapes the property mapper knows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrontMatterValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    /// A sequence whose elements are all strings.
    List(Vec<String>),
    /// Anything else: null, mappings, mixed or nested sequences.
    Other(serde_json::Value),
}

impl FrontMatterValue {
    fn from_yaml(value: YamlValue) -> Self {
        match value {
            YamlValue::String(s) => FrontMatterValue::String(s),
            YamlValue::Bool(b) => FrontMatterValue::Bool(b),
            YamlValue::Number(n) => match yaml_number_to_json(&n) {
                Some(num) => FrontMatterValue::Number(num),
                None => FrontMatterValue::Other(serde_json::Value::Null),
            },
            YamlValue::Sequence(items) => {
                if items.iter().all(|item| matches!(item, YamlValue::String(_))) {
                    FrontMatterValue::List(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                YamlValue::String(s) => Some(s),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    FrontMatterValue::Other(yaml_to_json(YamlValue::Sequence(items)))
                }
            }
            YamlValue::Tagged(tagged) => FrontMatterValue::from_yaml(tagged.value),
            other => FrontMatterValue::Other(yaml_to_json(other)),
        }
    }
}

fn yaml_number_to_json(n: &serde_yaml::Number) -> Option<serde_json::Number> {
    if let Some(i) = n.as_i64() {
        Some(i.into())
    } else if let Some(u) = n.as_u64() {
        Some(u.into())
    } else {
        n.as_f64().and_then(serde_json::Number::from_f64)
    }
}

fn yaml_to_json(value: YamlValue) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Ordered front matter entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    entries: Vec<(String, FrontMatterValue)>,
}

impl FrontMatter {
    pub fn new(entries: Vec<(String, FrontMatterValue)>) -> Self {
        Self { entries }
    }

    /// Parse the YAML between the `---` fences.
    ///
    /// An empty header or a header that is not a mapping yields empty front
    /// matter; only malformed YAML is an error.
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: YamlValue = serde_yaml::from_str(yaml)?;
        let YamlValue::Mapping(mapping) = value else {
            return Ok(Self::default());
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let key = match key {
                YamlValue::String(s) => s,
                YamlValue::Number(n) => n.to_string(),
                YamlValue::Bool(b) => b.to_string(),
                _ => continue,
            };
            entries.push((key, FrontMatterValue::from_yaml(value)));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&FrontMatterValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrontMatterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `title` field rendered as text, when it is a scalar.
    pub fn title(&self) -> Option<String> {
        match self.get("title")? {
            FrontMatterValue::String(s) => Some(s.clone()),
            FrontMatterValue::Number(n) => Some(n.to_string()),
            FrontMatterValue::Bool(b) => Some(b.to_string()),
            FrontMatterValue::List(_) | FrontMatterValue::Other(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Split a document into its raw front matter block and body.
///
/// Returns `(None, text)` when the document has no complete `---` fenced
/// header. When a header is present the body is trimmed.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(first_break) = text.find('\n') else {
        return (None, text);
    };
    if text[..first_break].trim_end() != "---" {
        return (None, text);
    }

    let header_start = first_break + 1;
    let mut offset = header_start;
    for line in text[header_start..].split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &text[header_start..offset];
            let body = &text[offset + line.len()..];
            return (Some(yaml), body.trim());
        }
        offset += line.len();
    }

    (None, text)
}
