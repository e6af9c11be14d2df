use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use extract::{ChatClient, Extractor, LlmSettings, Vocabulary};

pub const PROCESSED_TEXTS: &str = "processed_texts.json";
pub const ENTITIES_EXTRACTED: &str = "entities_extracted.json";
pub const TRIPLETS_FINAL: &str = "triplets_final.json";
pub const TRIPLETS_CLEANED: &str = "triplets_cleaned.json";
pub const INDEX: &str = "index.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Chat model over an OpenAI-compatible API
    Llm,
    /// Offline keyword rules
    #[value(alias = "demo")]
    Rules,
}

/// Where each stage reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePaths {
    pub processed: PathBuf,
    pub entities: PathBuf,
    pub triplets: PathBuf,
    pub cleaned: PathBuf,
    pub index: PathBuf,
}

impl Default for StagePaths {
    fn default() -> Self {
        Self {
            processed: PathBuf::from(PROCESSED_TEXTS),
            entities: PathBuf::from(ENTITIES_EXTRACTED),
            triplets: PathBuf::from(TRIPLETS_FINAL),
            cleaned: PathBuf::from(TRIPLETS_CLEANED),
            index: PathBuf::from(INDEX),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub mode: ExtractionMode,
    /// Overrides GRAPHRAG_CHAT_MODEL / OPENAI_MODEL
    pub model: Option<String>,
    pub core_concepts: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Llm,
            model: None,
            core_concepts: vec!["城市更新".to_string()],
        }
    }
}

impl ExtractionConfig {
    pub fn build_extractor(&self) -> Result<Extractor> {
        match self.mode {
            ExtractionMode::Rules => Ok(Extractor::rule_based()),
            ExtractionMode::Llm => {
                let settings = LlmSettings::from_env(self.model.as_deref())?;
                let base_url = settings.base_url.clone();
                let client = ChatClient::new(settings)?;
                tracing::info!(
                    base_url = %base_url,
                    model = %client.model(),
                    "LLM configuration loaded"
                );
                Ok(Extractor::with_llm(client, self.core_concepts.clone()))
            }
        }
    }
}

pub fn load_vocabulary(path: Option<&PathBuf>) -> Result<Vocabulary> {
    match path {
        Some(path) => Vocabulary::load(path)
            .with_context(|| format!("Failed to load vocabulary from {}", path.display())),
        None => Ok(Vocabulary::default()),
    }
}
