//! Tolerant extraction of structured payloads from free-form model output.
//!
//! Models wrap JSON in prose or code fences. We scan for the outermost
//! delimiter pair, try a strict decode of that slice, and report a typed
//! failure instead of panicking or returning an empty value.

use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract<T> {
    Parsed(T),
    NoPayload,
    Malformed(String),
}

impl<T> Extract<T> {
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Extract::Parsed(v) => Ok(v),
            Extract::NoPayload => Err("no structured payload found".into()),
            Extract::Malformed(e) => Err(e),
        }
    }
}

/// Slice between the first `open` and last `close`, inclusive.
pub fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn extract_list<T: DeserializeOwned>(text: &str) -> Extract<Vec<T>> {
    decode(delimited(text, '[', ']'))
}

pub fn extract_object<T: DeserializeOwned>(text: &str) -> Extract<T> {
    decode(delimited(text, '{', '}'))
}

fn decode<T: DeserializeOwned>(slice: Option<&str>) -> Extract<T> {
    match slice {
        None => Extract::NoPayload,
        Some(s) => match serde_json::from_str::<T>(s) {
            Ok(v) => Extract::Parsed(v),
            Err(e) => Extract::Malformed(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn list_inside_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n[\"a\", \"b\"]\n```\nEnjoy.";
        assert_eq!(extract_list::<String>(text), Extract::Parsed(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn missing_and_malformed_payloads_are_distinct() {
        assert_eq!(extract_list::<String>("no list here"), Extract::NoPayload);
        assert!(matches!(extract_list::<String>("[\"a\", ]"), Extract::Malformed(_)));
        assert_eq!(extract_list::<String>("] backwards ["), Extract::NoPayload);
    }

    #[test]
    fn object_extraction() {
        let got: Extract<Value> = extract_object("answer: {\"text\": \"hi\"} done");
        assert_eq!(got.into_result().unwrap()["text"], "hi");
    }
}
