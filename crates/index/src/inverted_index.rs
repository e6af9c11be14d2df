use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use extract::TripletRecord;
use extract::schema::scalar_text;

/// One triplet occurrence of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: Option<u64>,
    pub text: String,
    pub triplet: Vec<Value>,
}

/// Entity -> every triplet it appears in as head or tail, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    entries: BTreeMap<String, Vec<Occurrence>>,
}

impl InvertedIndex {
    pub fn build(records: &[TripletRecord]) -> Self {
        let mut entries: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();

        for record in records {
            for candidate in record.triplets.well_formed() {
                let triplet = candidate[..3].to_vec();

                for entity in [&candidate[0], &candidate[2]] {
                    let Some(key) = scalar_text(entity) else {
                        continue;
                    };
                    let key = key.trim();
                    if key.is_empty() {
                        continue;
                    }

                    entries.entry(key.to_string()).or_default().push(Occurrence {
                        id: record.id,
                        text: record.text.clone(),
                        triplet: triplet.clone(),
                    });
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, entity: &str) -> &[Occurrence] {
        self.entries
            .get(entity.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<TripletRecord> {
        serde_json::from_value(json!([
            {"id": 1, "text": "一", "triplets": [["政府", "推进", "绿化"], [" 政府 ", "实现", "更新"], ["bad"]]},
            {"id": 2, "text": "二", "triplets": {"error": "parse failed"}},
            {"id": 3, "text": "三", "triplets": [["片区", "发展", "绿化", "extra"], ["", "发展", "公园"]]},
        ]))
        .unwrap()
    }

    #[test]
    fn test_build_index() {
        let index = InvertedIndex::build(&records());

        assert_eq!(index.len(), 5);
        let government = index.get("政府");
        assert_eq!(government.len(), 2);
        assert_eq!(government[0].triplet, vec![json!("政府"), json!("推进"), json!("绿化")]);
        assert_eq!(government[1].triplet[0], json!(" 政府 "));

        let greening = index.get("绿化");
        assert_eq!(
            greening.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![Some(1), Some(3)]
        );
        assert_eq!(greening[1].triplet.len(), 3);

        assert!(index.get("").is_empty());
        assert_eq!(index.get("公园").len(), 1);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let index = InvertedIndex::build(&records());
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["片区"][0]["id"], 3);
        assert_eq!(json["片区"][0]["text"], "三");
    }
}
