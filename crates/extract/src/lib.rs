pub mod llm;
pub mod ner;
pub mod normalizer;
pub mod prompt;
pub mod relation;
pub mod retry;
pub mod salvage;
pub mod schema;
pub mod vocabulary;

pub use llm::{ChatClient, ChatMessage, LlmSettings};
pub use ner::{LlmEntityRecognizer, rule_based_entities};
pub use normalizer::{CleanReport, RemovalReason, TripletNormalizer, Verdict};
pub use relation::{LlmRelationExtractor, rule_based_triplets};
pub use retry::{RetryConfig, RetryPolicy};
pub use schema::{
    CleanedRecord, EntityField, EntityMap, EntityRecord, ParseFailure, Triplet, TripletField,
    TripletRecord,
};
pub use vocabulary::{SynonymGroup, Vocabulary};

use anyhow::Result;
use ingest::TextChunk;
use serde_json::Value;

/// Entity and relation extraction, backed either by a chat model or by keyword rules.
pub enum Extractor {
    Rules,
    Llm {
        entities: LlmEntityRecognizer,
        relations: LlmRelationExtractor,
    },
}

impl Extractor {
    pub fn rule_based() -> Self {
        Extractor::Rules
    }

    pub fn with_llm(client: ChatClient, core_concepts: Vec<String>) -> Self {
        Extractor::Llm {
            entities: LlmEntityRecognizer::new(client.clone()),
            relations: LlmRelationExtractor::new(client, core_concepts),
        }
    }

    /// Label the entities of one chunk.
    pub async fn recognize_entities(&self, chunk: &TextChunk) -> Result<EntityRecord> {
        let entities = match self {
            Extractor::Rules => EntityField::from(rule_based_entities(&chunk.text)),
            Extractor::Llm { entities, .. } => entities.recognize(&chunk.text).await?,
        };

        Ok(EntityRecord {
            id: Some(chunk.id),
            text: chunk.text.clone(),
            entities: Some(entities),
        })
    }

    /// Candidate triplets of one labelled chunk.
    pub async fn extract_relations(
        &self,
        record: &EntityRecord,
        syntax: Option<Value>,
    ) -> TripletRecord {
        let triplets = match self {
            Extractor::Rules => {
                let entities = record
                    .entities
                    .as_ref()
                    .map(EntityField::as_map)
                    .unwrap_or_default();
                TripletField::Candidates(
                    rule_based_triplets(&entities)
                        .into_iter()
                        .map(Value::from)
                        .collect(),
                )
            }
            Extractor::Llm { relations, .. } => {
                relations
                    .extract(&record.text, syntax.as_ref(), record.entities.as_ref())
                    .await
            }
        };

        TripletRecord {
            id: record.id,
            text: record.text.clone(),
            syntax,
            entities: record.entities.clone(),
            triplets,
        }
    }
}
