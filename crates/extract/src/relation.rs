use serde_json::Value;
use tracing::warn;

use crate::llm::ChatClient;
use crate::prompt::build_relation_messages;
use crate::salvage::extract_json_array;
use crate::schema::{EntityField, EntityMap, ParseFailure, Triplet, TripletField};

const TARGET_OBJECT: &str = "发展目标";
const PLANNING_SUBJECT: &str = "城市规划";
const GOVERNMENT: &str = "政府";

/// Stand-in emitted when the rules find nothing; the cleaner drops it.
pub fn placeholder_triplet() -> Triplet {
    Triplet::new("演示", "三元组", "示例")
}

/// Triplets derived from entity categories for offline demos.
pub fn rule_based_triplets(entities: &EntityMap) -> Vec<Triplet> {
    let category = |name: &str| entities.get(name).map(Vec::as_slice).unwrap_or(&[]);
    let locations = category("Location");
    let activities = category("Planned activity");
    let functions = category("Land use function");
    let concepts = category("Concept");

    let mut triplets = Vec::new();

    for location in locations {
        for activity in activities {
            triplets.push(Triplet::new(location, activity, TARGET_OBJECT));
        }
    }

    for function in functions {
        for _ in concepts {
            triplets.push(Triplet::new(PLANNING_SUBJECT, "实现", function));
        }
    }

    for activity in activities {
        triplets.push(Triplet::new(GOVERNMENT, "推进", activity));
    }

    if triplets.is_empty() {
        triplets.push(placeholder_triplet());
    }

    triplets
}

pub struct LlmRelationExtractor {
    client: ChatClient,
    core_concepts: Vec<String>,
}

impl LlmRelationExtractor {
    pub fn new(client: ChatClient, core_concepts: Vec<String>) -> Self {
        Self {
            client,
            core_concepts,
        }
    }

    /// Candidate triplets for one chunk. Never fails: request and parse errors
    /// become a failure marker in place of the list.
    pub async fn extract(
        &self,
        chunk_text: &str,
        syntax: Option<&Value>,
        entities: Option<&EntityField>,
    ) -> TripletField {
        let messages =
            build_relation_messages(chunk_text, syntax, entities, &self.core_concepts);

        match self.client.complete(&messages).await {
            Ok(reply) => parse_relation_reply(reply),
            Err(e) => {
                warn!(error = %e, "Relation extraction request failed");
                TripletField::Failed(ParseFailure::new(format!("{:#}", e), None))
            }
        }
    }
}

pub fn parse_relation_reply(reply: String) -> TripletField {
    match extract_json_array(&reply) {
        Ok(value) => TripletField::from_value(value),
        Err(e) => {
            warn!(error = %e, "Unparsable relation reply");
            TripletField::Failed(ParseFailure::new("parse_error", Some(reply)))
        }
    }
}
