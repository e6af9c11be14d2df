pub mod cli;
pub mod config;
pub mod stages;
pub mod store;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use extract::CleanReport;
use index::Neo4jConfig;

use config::{ExtractionConfig, StagePaths, load_vocabulary};

/// Everything a full run needs.
pub struct PipelineOptions {
    pub source: PathBuf,
    pub workdir: PathBuf,
    pub max_tokens: usize,
    pub extraction: ExtractionConfig,
    pub vocabulary: Option<PathBuf>,
    /// Import into Neo4j after indexing when set
    pub neo4j: Option<Neo4jConfig>,
}

impl StagePaths {
    pub fn under(dir: &Path) -> Self {
        let defaults = StagePaths::default();
        Self {
            processed: dir.join(defaults.processed),
            entities: dir.join(defaults.entities),
            triplets: dir.join(defaults.triplets),
            cleaned: dir.join(defaults.cleaned),
            index: dir.join(defaults.index),
        }
    }
}

/// data -> ner -> re -> clean -> index, then the optional import.
pub async fn run_pipeline(options: PipelineOptions) -> Result<CleanReport> {
    let paths = StagePaths::under(&options.workdir);
    let vocabulary = load_vocabulary(options.vocabulary.as_ref())?;
    let extractor = options.extraction.build_extractor()?;

    info!(source = %options.source.display(), mode = ?options.extraction.mode, "Starting pipeline");

    stages::run_data(&options.source, &paths.processed, options.max_tokens).await?;
    stages::run_ner(&paths.processed, &paths.entities, &extractor).await?;
    stages::run_re(&paths.entities, &paths.triplets, &extractor).await?;
    let report = stages::run_clean(&paths.triplets, &paths.cleaned, vocabulary).await?;
    stages::run_index(&paths.cleaned, &paths.index).await?;

    if let Some(neo4j) = &options.neo4j {
        stages::run_import(&paths.cleaned, neo4j).await?;
    }

    info!(workdir = %options.workdir.display(), kept = report.after, "Pipeline finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionMode;

    #[tokio::test]
    async fn test_rule_based_run_writes_every_stage_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("plan.md");
        tokio::fs::write(&source, "规划建设城市北部产业区。\n第3页\n").await.unwrap();

        let workdir = dir.path().join("out");
        let report = run_pipeline(PipelineOptions {
            source,
            workdir: workdir.clone(),
            max_tokens: 512,
            extraction: ExtractionConfig {
                mode: ExtractionMode::Rules,
                ..ExtractionConfig::default()
            },
            vocabulary: None,
            neo4j: None,
        })
        .await
        .unwrap();

        let paths = StagePaths::under(&workdir);
        for path in [
            &paths.processed,
            &paths.entities,
            &paths.triplets,
            &paths.cleaned,
            &paths.index,
        ] {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert_eq!(report.before, 3);
        assert_eq!(report.after, 3);
    }

    #[tokio::test]
    async fn test_missing_source_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_pipeline(PipelineOptions {
            source: dir.path().join("absent.txt"),
            workdir: dir.path().to_path_buf(),
            max_tokens: 512,
            extraction: ExtractionConfig {
                mode: ExtractionMode::Rules,
                ..ExtractionConfig::default()
            },
            vocabulary: None,
            neo4j: None,
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Input file not found"));
        assert!(!dir.path().join("processed_texts.json").exists());
    }
}
