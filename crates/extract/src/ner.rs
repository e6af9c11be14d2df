use anyhow::{Context, Result};
use tracing::warn;

use crate::llm::ChatClient;
use crate::prompt::build_ner_messages;
use crate::salvage::extract_json_value;
use crate::schema::{ENTITY_CATEGORIES, EntityField, EntityMap, ParseFailure};

/// Keyword triggers of the offline recognizer: any trigger word in the text
/// adds the fixed entity to its category.
const RULES: &[(&[&str], &str, &str)] = &[
    (&["规划", "建筑", "设计"], "Concept", "规划设计"),
    (&["发展", "建设"], "Planned activity", "发展建设"),
    (&["地点", "区", "城市"], "Location", "城市地区"),
    (&["产业", "功能"], "Land use function", "产业功能区"),
    (&["北", "南", "东", "西"], "Direction", "方位指向"),
];

/// Keyword-rule entity recognition used for offline demos.
///
/// Every category is present in the result, possibly empty.
pub fn rule_based_entities(text: &str) -> EntityMap {
    let mut entities: EntityMap = ENTITY_CATEGORIES
        .iter()
        .map(|c| (c.to_string(), Vec::new()))
        .collect();

    for (triggers, category, entity) in RULES {
        if triggers.iter().any(|t| text.contains(t)) {
            entities
                .entry(category.to_string())
                .or_default()
                .push(entity.to_string());
        }
    }

    entities
}

pub struct LlmEntityRecognizer {
    client: ChatClient,
}

impl LlmEntityRecognizer {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Ask the model for the entities of one chunk.
    ///
    /// Transport failures are errors; an unparsable reply is recorded as a
    /// [`ParseFailure`] carrying the raw reply.
    pub async fn recognize(&self, chunk_text: &str) -> Result<EntityField> {
        let messages = build_ner_messages(chunk_text);
        let reply = self
            .client
            .complete(&messages)
            .await
            .context("Entity recognition request failed")?;

        Ok(parse_entity_reply(reply))
    }
}

pub fn parse_entity_reply(reply: String) -> EntityField {
    match extract_json_value(&reply) {
        Ok(value) => EntityField::Parsed(value),
        Err(e) => {
            warn!(error = %e, "Unparsable entity reply");
            EntityField::Failed(ParseFailure::new(e.to_string(), Some(reply)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_based_entities() {
        let entities = rule_based_entities("推进城市北部产业区建设。");

        assert_eq!(entities.len(), 5);
        assert_eq!(entities["Planned activity"], vec!["发展建设"]);
        assert_eq!(entities["Location"], vec!["城市地区"]);
        assert_eq!(entities["Land use function"], vec!["产业功能区"]);
        assert_eq!(entities["Direction"], vec!["方位指向"]);
        assert!(entities["Concept"].is_empty());
    }

    #[test]
    fn test_rule_based_entities_without_triggers() {
        let entities = rule_based_entities("Nothing relevant here.");
        assert!(entities.values().all(|v| v.is_empty()));
    }

    #[test]
    fn test_parse_entity_reply() {
        let parsed = parse_entity_reply(r#"{"Location": ["深圳"]}"#.to_string());
        assert_eq!(parsed, EntityField::Parsed(json!({"Location": ["深圳"]})));

        let failed = parse_entity_reply("抱歉，我无法完成".to_string());
        match failed {
            EntityField::Failed(f) => assert_eq!(f.raw.as_deref(), Some("抱歉，我无法完成")),
            other => panic!("expected failure marker, got {:?}", other),
        }
    }
}
