use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use extract::{
    CleanReport, EntityRecord, Extractor, TripletNormalizer, TripletRecord, Vocabulary,
};
use index::{GraphStats, ImportPlan, InvertedIndex, Neo4jConfig, Neo4jIndexer};
use ingest::{ChunkerConfig, TextChunk};

use crate::store::{read_json, write_json};

fn progress(len: usize, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar.set_message(message);
    bar
}

/// Document -> `processed_texts.json`
pub async fn run_data(source: &Path, output: &Path, max_tokens: usize) -> Result<Vec<TextChunk>> {
    let chunks = ingest::ingest_file(source, ChunkerConfig { max_tokens }).await?;
    write_json(output, &chunks).await?;

    info!(chunks = chunks.len(), output = %output.display(), "Saved chunks");
    Ok(chunks)
}

/// `processed_texts.json` -> `entities_extracted.json`
pub async fn run_ner(input: &Path, output: &Path, extractor: &Extractor) -> Result<Vec<EntityRecord>> {
    let chunks: Vec<TextChunk> = read_json(input).await?;
    let bar = progress(chunks.len(), "NER");

    let mut records = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        records.push(extractor.recognize_entities(chunk).await?);
        bar.inc(1);
    }
    bar.finish_and_clear();

    write_json(output, &records).await?;
    info!(records = records.len(), output = %output.display(), "Saved NER results");
    Ok(records)
}

/// `entities_extracted.json` -> `triplets_final.json`
pub async fn run_re(input: &Path, output: &Path, extractor: &Extractor) -> Result<Vec<TripletRecord>> {
    // Read with the wider record shape so an upstream `syntax` field survives
    let labelled: Vec<TripletRecord> = read_json(input).await?;
    let bar = progress(labelled.len(), "Relation extraction");

    let mut records = Vec::with_capacity(labelled.len());
    for record in labelled {
        let entities = EntityRecord {
            id: record.id,
            text: record.text,
            entities: record.entities,
        };
        records.push(extractor.extract_relations(&entities, record.syntax).await);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let failed = records
        .iter()
        .filter(|r| matches!(r.triplets, extract::TripletField::Failed(_)))
        .count();

    write_json(output, &records).await?;
    info!(
        records = records.len(),
        failed,
        output = %output.display(),
        "Saved triplets"
    );
    Ok(records)
}

/// `triplets_final.json` -> `triplets_cleaned.json`, summary on stdout.
pub async fn run_clean(input: &Path, output: &Path, vocabulary: Vocabulary) -> Result<CleanReport> {
    let records: Vec<TripletRecord> = read_json(input).await?;

    let normalizer = TripletNormalizer::new(vocabulary);
    let (cleaned, report) = normalizer.clean(&records);

    write_json(output, &cleaned).await?;
    println!("{}", report);

    Ok(report)
}

/// Triplet file -> `index.json`
pub async fn run_index(input: &Path, output: &Path) -> Result<InvertedIndex> {
    let records: Vec<TripletRecord> = read_json(input).await?;
    let index = InvertedIndex::build(&records);

    write_json(output, &index).await?;
    info!(entities = index.len(), output = %output.display(), "Saved index");
    Ok(index)
}

/// Triplet file -> Neo4j
pub async fn run_import(input: &Path, config: &Neo4jConfig) -> Result<usize> {
    let records: Vec<TripletRecord> = read_json(input).await?;
    let plan = ImportPlan::from_records(&records);

    let indexer = Neo4jIndexer::connect(config).await?;
    indexer.init_schema().await?;

    let bar = progress(plan.upserts.len(), "Importing to Neo4j");
    let applied = indexer.import(&plan, |n| bar.inc(n as u64)).await?;
    bar.finish_and_clear();

    println!(
        "Imported {} triplets into {} ({} skipped)",
        applied, config.uri, plan.skipped
    );
    Ok(applied)
}

pub async fn run_check(config: &Neo4jConfig) -> Result<GraphStats> {
    let indexer = Neo4jIndexer::connect(config).await?;
    indexer.ping().await?;
    println!("Connected to {}", config.uri);

    let stats = indexer.get_stats().await?;
    println!("nodes: {}", stats.node_count);
    println!("relationships: {}", stats.relation_count);

    if stats.node_count == 0 {
        println!("\nNo data found in database");
        return Ok(stats);
    }

    println!("\nlabel sets:");
    for labels in &stats.label_sets {
        println!("  {:?}", labels);
    }
    println!("\nsample triplets:");
    for (head, rel, tail) in &stats.samples {
        println!("  ({}) -[{}]-> ({})", head, rel, tail);
    }

    Ok(stats)
}

/// Relation labels by descending frequency, ties by label.
pub fn relation_frequencies(records: &[TripletRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for candidate in record.triplets.well_formed() {
            let label = match &candidate[1] {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            *counts.entry(label).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Print counts, the most frequent relation labels and a few sample records.
pub async fn run_show(input: &Path) -> Result<()> {
    let records: Vec<TripletRecord> = read_json(input).await?;
    let total: usize = records.iter().map(|r| r.triplets.len()).sum();

    println!("records: {}", records.len());
    println!("triplets: {}", total);

    println!("\nrelation labels (top 10):");
    for (label, count) in relation_frequencies(&records).into_iter().take(10) {
        println!("  {}: {}", label, count);
    }

    println!("\nfirst 5 records:");
    for (i, record) in records.iter().take(5).enumerate() {
        let preview: String = record.text.replace('\n', " ").chars().take(200).collect();
        println!("---");
        let id = record.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!("#{}  id: {}", i + 1, id);
        println!("text: {}", preview);
        println!("triplets: {}", record.triplets.len());
        if let extract::TripletField::Candidates(candidates) = &record.triplets {
            for candidate in candidates.iter().take(10) {
                println!("  - {}", candidate);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{CleanedRecord, RemovalReason};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_clean_stage_writes_full_structure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("triplets_final.json");
        let output = dir.path().join("triplets_cleaned.json");

        write_json(
            &input,
            &json!([
                {"id": 1, "text": "一", "syntax": {"dep": ""}, "triplets": [
                    ["城市规划", "推进交通建设", "交通网络"],
                    ["演示", "三元组", "示例"]
                ]},
                {"id": 2, "text": "二", "triplets": {"error": "parse failed"}}
            ]),
        )
        .await
        .unwrap();

        let report = run_clean(&input, &output, Vocabulary::default()).await.unwrap();
        assert_eq!(report.before, 2);
        assert_eq!(report.after, 1);
        assert_eq!(report.removed_for(RemovalReason::LlmParseError), 1);

        let cleaned: Vec<CleanedRecord> = read_json(&output).await.unwrap();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].syntax, Some(json!({"dep": ""})));
        assert_eq!(
            serde_json::to_value(&cleaned[0].triplets).unwrap(),
            json!([["城市规划", "推进", "交通网络"]])
        );
        assert!(cleaned[1].triplets.is_empty());
    }

    #[tokio::test]
    async fn test_clean_stage_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_clean(
            &dir.path().join("triplets_final.json"),
            &dir.path().join("out.json"),
            Vocabulary::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("triplets_final.json not found"));
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_rule_based_stages_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("plan.txt");
        tokio::fs::write(&source, "推进城市北部产业区建设。\n12\n完善公园绿地。")
            .await
            .unwrap();

        let processed = dir.path().join("processed_texts.json");
        let entities = dir.path().join("entities_extracted.json");
        let triplets = dir.path().join("triplets_final.json");
        let cleaned = dir.path().join("triplets_cleaned.json");
        let index = dir.path().join("index.json");

        let chunks = run_data(&source, &processed, 512).await.unwrap();
        assert_eq!(chunks.len(), 1);

        let extractor = Extractor::rule_based();
        run_ner(&processed, &entities, &extractor).await.unwrap();
        let raw = run_re(&entities, &triplets, &extractor).await.unwrap();
        assert_eq!(raw[0].triplets.len(), 2);

        let report = run_clean(&triplets, &cleaned, Vocabulary::default()).await.unwrap();
        assert_eq!(report.after, 2);

        let built = run_index(&cleaned, &index).await.unwrap();
        assert_eq!(built.get("政府").len(), 1);

        let on_disk: Value = read_json(&index).await.unwrap();
        assert_eq!(on_disk["城市地区"][0]["triplet"], json!(["城市地区", "发展", "发展目标"]));
    }

    #[tokio::test]
    async fn test_relation_stage_keeps_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("entities_extracted.json");
        let output = dir.path().join("triplets_final.json");

        write_json(
            &input,
            &json!([{
                "id": 7,
                "text": "无",
                "syntax": {"dep": "nsubj"},
                "entities": {"error": "parse failed"}
            }]),
        )
        .await
        .unwrap();

        let records = run_re(&input, &output, &Extractor::rule_based()).await.unwrap();
        assert_eq!(records[0].id, Some(7));
        assert_eq!(records[0].syntax, Some(json!({"dep": "nsubj"})));
        assert_eq!(
            serde_json::to_value(&records[0].triplets).unwrap(),
            json!([["演示", "三元组", "示例"]])
        );
    }

    #[test]
    fn test_relation_frequencies() {
        let records: Vec<TripletRecord> = serde_json::from_value(json!([
            {"id": 1, "text": "", "triplets": [["a", "推进", "b"], ["c", "实现", "d"], ["e", "推进", "f"]]},
            {"id": 2, "text": "", "triplets": [["a", "发展", "b"], ["x"]]},
        ]))
        .unwrap();

        assert_eq!(
            relation_frequencies(&records),
            vec![
                ("推进".to_string(), 2),
                ("发展".to_string(), 1),
                ("实现".to_string(), 1),
            ]
        );
    }
}
