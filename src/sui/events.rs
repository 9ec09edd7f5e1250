//! Typed view of the indexer's `MoveData` JSON.
//!
//! Event contents arrive as an externally tagged union (`{"Struct": [...]}`,
//! `{"Address": [bytes]}`, `{"Option": ...}`). Decoding into [`MoveData`] up front
//! lets callers validate required fields per item instead of walking raw JSON.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum MoveData {
    Address(Vec<u8>),
    #[serde(rename = "UID")]
    Uid(Vec<u8>),
    #[serde(rename = "ID")]
    Id(Vec<u8>),
    Bool(bool),
    Number(String),
    String(String),
    Vector(Vec<MoveData>),
    Option(Option<Box<MoveData>>),
    Struct(Vec<MoveField>),
    Variant(MoveVariant),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoveField {
    pub name: String,
    pub value: MoveData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoveVariant {
    pub name: String,
    pub fields: Vec<MoveField>,
}

impl MoveData {
    pub fn field(&self, name: &str) -> Option<&MoveData> {
        match self {
            Self::Struct(fields) => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// `0x`-prefixed hex of an address / ID / UID payload.
    pub fn as_hex_id(&self) -> Option<String> {
        match self {
            Self::Address(bytes) | Self::Id(bytes) | Self::Uid(bytes) => Some(to_hex(bytes)),
            _ => None,
        }
    }

    /// Unwraps `Option::Some`; `None` for an empty option or any other shape.
    pub fn as_some(&self) -> Option<&MoveData> {
        match self {
            Self::Option(inner) => inner.as_deref(),
            _ => None,
        }
    }

    /// First string field in a struct, e.g. the `url` of a `Url` wrapper.
    pub fn first_string(&self) -> Option<&str> {
        match self {
            Self::Struct(fields) => fields.iter().find_map(|f| f.value.as_str()),
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_nested_struct() {
        let raw = json!({
            "Struct": [
                {"name": "creator", "value": {"Address": [0, 171, 1, 255]}},
                {"name": "coin_name", "value": {"String": "Frog"}},
                {"name": "image_url", "value": {"Option": {"Struct": [
                    {"name": "url", "value": {"String": "https://img"}}
                ]}}},
                {"name": "website", "value": {"Option": null}}
            ]
        });

        let data: MoveData = serde_json::from_value(raw).unwrap();
        assert_eq!(data.field("creator").and_then(MoveData::as_hex_id), Some("0x00ab01ff".to_string()));
        assert_eq!(data.field("coin_name").and_then(MoveData::as_str), Some("Frog"));
        assert_eq!(
            data.field("image_url").and_then(MoveData::as_some).and_then(MoveData::first_string),
            Some("https://img")
        );
        assert!(data.field("website").and_then(MoveData::as_some).is_none());
        assert!(data.field("missing").is_none());
    }
}
