//! Lenient recovery of JSON from chat-model replies that wrap it in prose or fences.

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").unwrap());
static TRAILING_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}$").unwrap());
static TRAILING_NESTED_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\s*\[.*\]\s*\]$").unwrap());
static FIRST_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());
static NESTED_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\s*\[.*\]\s*\]").unwrap());

fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str())
}

fn first_parsable(text: &str, patterns: &[&Regex]) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    patterns
        .iter()
        .filter_map(|re| re.find(text))
        .find_map(|m| serde_json::from_str(m.as_str()).ok())
}

/// Recover a JSON object (or nested array) from a model reply.
pub fn extract_json_value(reply: &str) -> Result<Value> {
    let text = unfence(reply);
    first_parsable(
        text,
        &[&TRAILING_OBJECT, &TRAILING_NESTED_ARRAY, &FIRST_OBJECT],
    )
    .ok_or_else(|| anyhow::anyhow!("Could not parse JSON from model reply"))
}

/// Recover a `[[h, r, t], ...]` list from a model reply.
pub fn extract_json_array(reply: &str) -> Result<Value> {
    let text = unfence(reply);
    first_parsable(text, &[&NESTED_ARRAY])
        .ok_or_else(|| anyhow::anyhow!("Could not parse triplet list from model reply"))
}
