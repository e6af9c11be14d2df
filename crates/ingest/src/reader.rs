use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            anyhow::bail!("Input file not found: {}", path.display());
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                Ok(content)
            }
            "pdf" => Self::read_pdf(path.to_path_buf()).await,
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    async fn read_pdf(path: PathBuf) -> Result<String> {
        // pdf-extract is synchronous and CPU-bound
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text(&path)
                .map_err(|e| anyhow!("PDF extraction failed for {:?}: {}", path, e))
        })
        .await
        .context("PDF extraction task panicked")?
    }
}
