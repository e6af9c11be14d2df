use serde::{Deserialize, Serialize};

use crate::chunker::estimate_tokens;

/// One token-budgeted group of sentences from a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Sequential per source, starting at 1
    pub id: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TextChunk {
    pub fn new(id: u64, text: String, source: &str) -> Self {
        Self {
            id,
            text,
            source: Some(source.to_string()),
        }
    }

    /// Estimate token count (rough: 2 characters per token)
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}
