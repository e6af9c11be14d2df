use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Entity categories recognised in urban-planning text.
pub const ENTITY_CATEGORIES: [&str; 5] = [
    "Location",
    "Land use function",
    "Direction",
    "Concept",
    "Planned activity",
];

/// Category name -> entity surface strings.
pub type EntityMap = BTreeMap<String, Vec<String>>;

/// Marker stored in place of a stage result when the model reply could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ParseFailure {
    pub fn new(error: impl Into<String>, raw: Option<String>) -> Self {
        Self {
            error: error.into(),
            raw,
        }
    }
}

/// Entity recognition result of one chunk: either a category map or a failure marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityField {
    Failed(ParseFailure),
    Parsed(Value),
}

impl EntityField {
    /// Typed view of the entity map; anything that is not a category -> string list
    /// object reads as empty.
    pub fn as_map(&self) -> EntityMap {
        match self {
            EntityField::Parsed(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
            EntityField::Failed(_) => EntityMap::new(),
        }
    }
}

impl From<EntityMap> for EntityField {
    fn from(map: EntityMap) -> Self {
        EntityField::Parsed(serde_json::to_value(map).unwrap_or(Value::Null))
    }
}

/// Raw candidate triples of one chunk as written by relation extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TripletField {
    Candidates(Vec<Value>),
    Failed(ParseFailure),
    /// Anything else, including `null`.
    Other(Value),
}

impl Default for TripletField {
    fn default() -> Self {
        TripletField::Candidates(Vec::new())
    }
}

impl TripletField {
    /// Classify a parsed model reply.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(TripletField::Other(value))
    }

    /// Candidates whose shape is at least `[h, r, t]`.
    pub fn well_formed(&self) -> impl Iterator<Item = &[Value]> {
        let candidates: &[Value] = match self {
            TripletField::Candidates(candidates) => candidates,
            _ => &[],
        };
        candidates
            .iter()
            .filter_map(|c| c.as_array())
            .filter(|c| c.len() >= 3)
            .map(|c| c.as_slice())
    }

    pub fn len(&self) -> usize {
        match self {
            TripletField::Candidates(candidates) => candidates.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Text of a scalar triplet element. Strings as-is, numbers and booleans
/// rendered; `null`, arrays and objects have no text.
pub fn scalar_text(element: &Value) -> Option<String> {
    match element {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// An ordered (head, relation, tail) statement. Serialized as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[String; 3]", into = "[String; 3]")]
pub struct Triplet {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl Triplet {
    pub fn new(head: impl Into<String>, relation: impl Into<String>, tail: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }
}

impl From<[String; 3]> for Triplet {
    fn from([head, relation, tail]: [String; 3]) -> Self {
        Self { head, relation, tail }
    }
}

impl From<Triplet> for [String; 3] {
    fn from(t: Triplet) -> Self {
        [t.head, t.relation, t.tail]
    }
}

impl From<Triplet> for Value {
    fn from(t: Triplet) -> Self {
        Value::from(vec![t.head, t.relation, t.tail])
    }
}

/// A `null` text reads as empty so one bad chunk cannot sink a whole file.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Output of entity recognition for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityField>,
}

/// Output of relation extraction for one chunk; input of the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripletRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityField>,
    #[serde(default)]
    pub triplets: TripletField,
}

/// A chunk after cleaning: same shape, triplets replaced by the survivors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityField>,
    pub triplets: Vec<Triplet>,
}

impl From<CleanedRecord> for TripletRecord {
    fn from(record: CleanedRecord) -> Self {
        Self {
            id: record.id,
            text: record.text,
            syntax: record.syntax,
            entities: record.entities,
            triplets: TripletField::Candidates(
                record.triplets.into_iter().map(Value::from).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_triplet_field_shapes() {
        let record: TripletRecord = serde_json::from_value(json!({
            "id": 1, "text": "t", "triplets": [["a", "b", "c"], ["x"]]
        }))
        .unwrap();
        assert_eq!(record.triplets.len(), 2);
        assert_eq!(record.triplets.well_formed().count(), 1);

        let record: TripletRecord = serde_json::from_value(json!({
            "id": 2, "text": "t", "triplets": {"error": "parse failed"}
        }))
        .unwrap();
        assert!(matches!(record.triplets, TripletField::Failed(ref f) if f.error == "parse failed"));

        let record: TripletRecord = serde_json::from_value(json!({"id": 3, "text": "t"})).unwrap();
        assert!(record.triplets.is_empty());

        let record: TripletRecord =
            serde_json::from_value(json!({"id": 4, "text": "t", "triplets": null})).unwrap();
        assert_eq!(record.triplets, TripletField::Other(Value::Null));
    }

    #[test]
    fn test_loose_record_fields() {
        let record: TripletRecord =
            serde_json::from_value(json!({"text": null, "triplets": [["a", "b", "c"]]})).unwrap();
        assert_eq!(record.id, None);
        assert_eq!(record.text, "");

        let back = serde_json::to_value(&record).unwrap();
        assert!(back.get("id").is_none());
    }

    #[test]
    fn test_triplet_serializes_as_array() {
        let t = Triplet::new("政府", "推进", "绿化");
        assert_eq!(serde_json::to_value(&t).unwrap(), json!(["政府", "推进", "绿化"]));

        let back: Triplet = serde_json::from_value(json!(["a", "b", "c"])).unwrap();
        assert_eq!(back, Triplet::new("a", "b", "c"));
    }

    #[test]
    fn test_entity_field_failure_reads_as_empty_map() {
        let field: EntityField =
            serde_json::from_value(json!({"error": "bad json", "raw": "..."})).unwrap();
        assert!(matches!(field, EntityField::Failed(_)));
        assert!(field.as_map().is_empty());

        let field: EntityField =
            serde_json::from_value(json!({"Location": ["城市地区"], "Direction": []})).unwrap();
        assert_eq!(field.as_map()["Location"], vec!["城市地区".to_string()]);
    }
}
