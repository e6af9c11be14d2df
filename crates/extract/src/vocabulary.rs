use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Word lists driving the triplet normalizer.
///
/// Every list can be replaced from a TOML file; missing keys keep the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Substrings marking demo/sample filler
    pub placeholder_keywords: Vec<String>,
    /// The only valid single-character entities
    pub direction_words: Vec<String>,
    /// A relation must contain at least one of these
    pub relation_keywords: Vec<String>,
    /// Evaluated top to bottom, first match wins
    pub synonym_groups: Vec<SynonymGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub keywords: Vec<String>,
    pub canonical: String,
}

impl SynonymGroup {
    pub fn new(keywords: &[&str], canonical: &str) -> Self {
        Self {
            keywords: strings(keywords),
            canonical: canonical.to_string(),
        }
    }

    pub fn matches(&self, relation: &str) -> bool {
        self.keywords.iter().any(|k| relation.contains(k.as_str()))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            placeholder_keywords: strings(&["演示", "示例", "三元组", "demo"]),
            direction_words: strings(&[
                "北", "南", "东", "西", "东北", "东南", "西北", "西南", "中", "上", "下",
            ]),
            relation_keywords: strings(&[
                "推进", "促进", "推动", "实现", "完成", "发展", "建设", "规划", "计划", "采用",
                "覆盖", "建立", "设置", "改善", "增加", "实施",
            ]),
            synonym_groups: vec![
                SynonymGroup::new(&["推进", "促进", "推动"], "推进"),
                SynonymGroup::new(&["实现", "完成"], "实现"),
                SynonymGroup::new(&["发展", "建设"], "发展"),
                SynonymGroup::new(&["规划", "计划"], "规划活动"),
            ],
        }
    }
}

impl Vocabulary {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid vocabulary file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vocabulary file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let vocab = Vocabulary::from_toml_str(
            r#"
            placeholder_keywords = ["sample"]

            [[synonym_groups]]
            keywords = ["build", "construct"]
            canonical = "build"
            "#,
        )
        .unwrap();

        assert_eq!(vocab.placeholder_keywords, vec!["sample"]);
        assert_eq!(vocab.synonym_groups.len(), 1);
        assert_eq!(vocab.direction_words, Vocabulary::default().direction_words);
        assert_eq!(vocab.relation_keywords, Vocabulary::default().relation_keywords);
    }

    #[test]
    fn test_synonym_group_matching() {
        let group = SynonymGroup::new(&["实现", "完成"], "实现");
        assert!(group.matches("完成建设任务"));
        assert!(!group.matches("推进"));
    }
}
