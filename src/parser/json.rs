use crate::error::ParserError;
use serde_json::{Map, Value};

/// Keys a question payload may carry
const ALLOWED_KEYS: [&str; 2] = ["question", "answers"];

/// Typographic double quotes that models sometimes emit in place of `"`
const SMART_QUOTES: [char; 4] = ['\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}'];

/// Replace smart double quotes with ASCII quotes, returning the replacement count
pub fn normalize_quotes(raw: &str) -> (String, usize) {
    let mut fixed = 0;
    let normalized = raw
        .chars()
        .map(|c| {
            if SMART_QUOTES.contains(&c) {
                fixed += 1;
                '"'
            } else {
                c
            }
        })
        .collect();
    (normalized, fixed)
}

/// Parse content as a JSON object restricted to the allowed keys
pub fn parse_payload_object(content: &str) -> Result<Map<String, Value>, ParserError> {
    let value: Value = serde_json::from_str(content.trim())?;
    let Value::Object(object) = value else {
        return Err(ParserError::NotAnObject);
    };

    let mut unexpected: Vec<String> = object
        .keys()
        .filter(|k| !ALLOWED_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        return Err(ParserError::UnexpectedKeys(unexpected));
    }

    Ok(object)
}

/// Extract `answers` as strings, before any trimming
pub fn answer_strings(value: &Value) -> Result<Vec<String>, ParserError> {
    let items = value.as_array().ok_or(ParserError::AnswersNotArray)?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or(ParserError::AnswerNotString { index })
        })
        .collect()
}
