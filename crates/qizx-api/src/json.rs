//! Decoding of the JSON listings returned with `format=json`
//!
//! The server emits record listings that are not quite JSON: enum-like values
//! appear as bare words and string values may contain unescaped quotes. The
//! text is repaired before it is handed to `serde_json`.

use crate::error::{QizxError, Result};
use crate::types::Record;
use serde_json::Value;

/// Quote bare words and escape quotes that do not terminate their string.
pub(crate) fn canonicalize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' {
            i = copy_string(&chars, i, &mut out);
        } else if c == '-' || c.is_ascii_digit() {
            let start = i;
            i += 1;
            while i < chars.len() && matches!(chars[i], '0'..='9' | '.' | 'e' | 'E' | '+' | '-') {
                i += 1;
            }
            out.extend(&chars[start..i]);
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.as_str() {
                "true" | "false" | "null" => out.push_str(&word),
                _ => {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                },
            }
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

/// Copy the string opening at `start`; returns the index just past it.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                out.push('\\');
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                }
                i += 2;
            },
            '"' if closes_string(chars, i + 1) => {
                out.push('"');
                return i + 1;
            },
            '"' => {
                out.push_str("\\\"");
                i += 1;
            },
            c => {
                out.push(c);
                i += 1;
            },
        }
    }

    i
}

/// A quote ends its string when the next significant character is structural.
fn closes_string(chars: &[char], from: usize) -> bool {
    chars
        .get(from..)
        .unwrap_or_default()
        .iter()
        .find(|c| !c.is_whitespace())
        .map_or(true, |c| matches!(c, ',' | ':' | ']' | '}'))
}

/// The `records` array of a listing.
pub(crate) fn decode_records(body: &[u8]) -> Result<Vec<Record>> {
    let text = String::from_utf8_lossy(body);
    let document: Value = serde_json::from_str(&canonicalize(&text))
        .map_err(|e| QizxError::MalformedJson(e.to_string()))?;

    match document.get("records") {
        Some(Value::Array(records)) => records
            .iter()
            .map(|record| match record {
                Value::Object(fields) => Ok(fields.clone()),
                other => Err(QizxError::MalformedJson(format!("record is not an object: {}", other))),
            })
            .collect(),
        _ => Err(QizxError::MalformedJson("missing 'records' array".into())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_words_are_quoted() {
        assert_eq!(
            canonicalize(r#"{"State": RUNNING, "Done": true, "Rank": -1.5e3, "Note": null}"#),
            r#"{"State": "RUNNING", "Done": true, "Rank": -1.5e3, "Note": null}"#
        );
    }

    #[test]
    fn test_inner_quotes_are_escaped() {
        let fixed = canonicalize(r#"{"Query": "doc("a.xml")//b", "Id": "x\"y"}"#);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["Query"], json!(r#"doc("a.xml")//b"#));
        assert_eq!(value["Id"], json!("x\"y"));
    }

    #[test]
    fn test_decode_records() {
        let body = br#"{ "records": [ { "Name": "backup", "Progress": 0.5, "Kind": MAINTENANCE } ] }"#;
        let records = decode_records(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Kind"], json!("MAINTENANCE"));
        assert_eq!(records[0]["Progress"], json!(0.5));
    }

    #[test]
    fn test_records_array_is_required() {
        assert!(matches!(
            decode_records(br#"{"rows": []}"#),
            Err(QizxError::MalformedJson(_))
        ));
        assert!(decode_records(b"{").is_err());
    }
}
