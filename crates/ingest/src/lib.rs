pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::TextChunk;
pub use chunker::{Chunker, ChunkerConfig, clean_text, estimate_tokens, split_sentences};
pub use reader::FileReader;

use anyhow::Result;
use std::path::Path;
use tracing::info;

/// Main ingestion pipeline: read, clean, split into sentences and chunk.
pub async fn ingest_file(file_path: &Path, config: ChunkerConfig) -> Result<Vec<TextChunk>> {
    let content = FileReader::read_file(file_path).await?;
    let source = file_path.to_string_lossy();

    let chunker = Chunker::new(config);
    let chunks = chunker.chunk_text(&content, &source);

    info!(
        source = %source,
        characters = content.chars().count(),
        chunks = chunks.len(),
        "Document chunked"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_ingest_file() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        writeln!(file, "第1页").unwrap();
        writeln!(file, "7").unwrap();
        writeln!(file, "推进城市更新。建设交通网络。").unwrap();

        let chunks = ingest_file(file.path(), ChunkerConfig::default())
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, 1);
        assert_eq!(chunks[0].text, "第1页\n推进城市更新。建设交通网络。");
    }
}
