use regex::Regex;
use std::sync::LazyLock;

use crate::chunk::TextChunk;

const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '!', '?', '.'];

static PAGE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,4}$").unwrap());
static PAGE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^page\s*\d+").unwrap());

pub struct ChunkerConfig {
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_tokens: 512 }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Clean, split and chunk a raw document into sequentially numbered chunks.
    pub fn chunk_text(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let cleaned = clean_text(text);
        let sentences = split_sentences(&cleaned);

        self.chunk_sentences(&sentences)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| TextChunk::new(i as u64 + 1, chunk, source))
            .collect()
    }

    /// Greedily pack sentences into chunks of at most `max_tokens`.
    ///
    /// A sentence that would overflow a non-empty buffer starts a new chunk.
    /// A single sentence larger than the budget becomes a chunk of its own.
    pub fn chunk_sentences<S: AsRef<str>>(&self, sentences: &[S]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_tokens = 0;

        for sentence in sentences {
            let sentence = sentence.as_ref();
            let tokens = estimate_tokens(sentence);

            if !buffer.is_empty() && buffer_tokens + tokens > self.config.max_tokens {
                chunks.push(std::mem::take(&mut buffer));
                buffer_tokens = 0;
            }

            buffer.push_str(sentence);
            buffer_tokens += tokens;
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        chunks
    }
}

/// Strip layout noise left by PDF extraction: blank lines, bare page numbers
/// and "Page N" headers.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !PAGE_NUMBER.is_match(line))
        .filter(|line| !PAGE_HEADER.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split after every sentence terminator, keeping the terminator with its sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);

        if SENTENCE_TERMINATORS.contains(&ch) {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);

    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, sentence: &str) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

/// Rough token estimate: one token per two characters, never zero.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_drops_page_noise() {
        let raw = "  第一章 总则  \n\n12\nPage 3\npage4 of 10\n城市更新。\n2024年规划\n";
        assert_eq!(clean_text(raw), "第一章 总则\n城市更新。\n2024年规划");
    }

    #[test]
    fn test_split_sentences_keeps_terminators() {
        let sentences = split_sentences("推进城市更新。完善交通网络！  Is it done? Yes.");
        assert_eq!(
            sentences,
            vec!["推进城市更新。", "完善交通网络！", "Is it done?", "Yes."]
        );
    }

    #[test]
    fn test_split_sentences_without_terminator() {
        assert_eq!(split_sentences("没有句号的文本"), vec!["没有句号的文本"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("城市更新"), 2);
    }

    #[test]
    fn test_greedy_chunking_respects_budget() {
        let chunker = Chunker::new(ChunkerConfig { max_tokens: 4 });
        // 4 chars -> 2 tokens each
        let sentences = ["一二三。", "四五六。", "七八九。"];
        let chunks = chunker.chunk_sentences(&sentences);

        assert_eq!(chunks, vec!["一二三。四五六。", "七八九。"]);
    }

    #[test]
    fn test_oversize_sentence_gets_own_chunk() {
        let chunker = Chunker::new(ChunkerConfig { max_tokens: 2 });
        let sentences = ["短。", "这是一个很长很长的句子。", "短。"];
        let chunks = chunker.chunk_sentences(&sentences);

        assert_eq!(chunks, vec!["短。", "这是一个很长很长的句子。", "短。"]);
    }

    #[test]
    fn test_chunk_text_numbers_from_one() {
        let chunker = Chunker::new(ChunkerConfig { max_tokens: 3 });
        let chunks = chunker.chunk_text("推进更新。\n1\n建设公园。", "plan.txt");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, 1);
        assert_eq!(chunks[1].id, 2);
        assert_eq!(chunks[1].text, "建设公园。");
        assert_eq!(chunks[0].source.as_deref(), Some("plan.txt"));
    }

    #[test]
    fn test_every_sentence_lands_in_one_chunk() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let text = "规划先行。".repeat(400);
        let sentences = split_sentences(&text);
        let chunks = chunker.chunk_sentences(&sentences);

        // 2 tokens per sentence, 256 sentences fill the default budget
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "规划先行。".repeat(256));
        assert_eq!(chunks.concat(), sentences.concat());
    }
}
