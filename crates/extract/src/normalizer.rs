//! Cleaning pass over candidate triplets.
//!
//! Each candidate goes through a fixed sequence of acceptance checks
//! (shape, placeholder, self-loop, entity validity, relation keyword), its
//! relation is mapped to a canonical synonym label, and survivors are
//! deduplicated per chunk. Nothing in here fails a batch: every rejected
//! candidate is counted under a [`RemovalReason`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, error};

use crate::schema::{CleanedRecord, Triplet, TripletField, TripletRecord, scalar_text};
use crate::vocabulary::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    BadFormat,
    /// Counted once per chunk whose whole candidate list is an error marker
    LlmParseError,
    Placeholder,
    HeadEqTail,
    InvalidEntity,
    RelNoKeyword,
    Dup,
    Exception,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::BadFormat => "bad_format",
            RemovalReason::LlmParseError => "llm_parse_error",
            RemovalReason::Placeholder => "placeholder",
            RemovalReason::HeadEqTail => "head_eq_tail",
            RemovalReason::InvalidEntity => "invalid_entity",
            RemovalReason::RelNoKeyword => "rel_no_keyword",
            RemovalReason::Dup => "dup",
            RemovalReason::Exception => "exception",
        }
    }

    /// Chunk-level reasons do not correspond to a candidate.
    pub fn is_chunk_level(&self) -> bool {
        matches!(self, RemovalReason::LlmParseError)
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for a single candidate, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep(Triplet),
    Reject(RemovalReason),
}

/// Totals of one cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanReport {
    /// Candidates seen before filtering
    pub before: usize,
    /// Triplets kept after filtering and deduplication
    pub after: usize,
    pub removed: BTreeMap<RemovalReason, usize>,
}

impl CleanReport {
    fn count(&mut self, reason: RemovalReason) {
        *self.removed.entry(reason).or_insert(0) += 1;
    }

    pub fn removed_for(&self, reason: RemovalReason) -> usize {
        self.removed.get(&reason).copied().unwrap_or(0)
    }

    /// Reasons by descending count, ties by reason name.
    pub fn ranked(&self) -> Vec<(RemovalReason, usize)> {
        let mut ranked: Vec<_> = self.removed.iter().map(|(r, n)| (*r, *n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        ranked
    }

    /// Sum of removals that stand for a single candidate.
    pub fn candidate_rejections(&self) -> usize {
        self.removed
            .iter()
            .filter(|(reason, _)| !reason.is_chunk_level())
            .map(|(_, n)| n)
            .sum()
    }
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cleaning finished")?;
        writeln!(f, "total triplets (before): {}", self.before)?;
        writeln!(f, "total triplets (after):  {}", self.after)?;
        writeln!(f)?;
        write!(f, "removal reasons:")?;
        for (reason, count) in self.ranked() {
            write!(f, "\n  {}: {}", reason, count)?;
        }
        Ok(())
    }
}

pub struct TripletNormalizer {
    vocabulary: Vocabulary,
}

impl Default for TripletNormalizer {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}

impl TripletNormalizer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Clean every record. Output order follows input order.
    pub fn clean(&self, records: &[TripletRecord]) -> (Vec<CleanedRecord>, CleanReport) {
        let mut report = CleanReport::default();
        let cleaned = records
            .iter()
            .map(|record| self.clean_record(record, &mut report))
            .collect();

        debug!(
            before = report.before,
            after = report.after,
            "Triplet cleaning finished"
        );

        (cleaned, report)
    }

    /// Clean the candidates of one chunk, adding its counts to `report`.
    pub fn clean_record(&self, record: &TripletRecord, report: &mut CleanReport) -> CleanedRecord {
        self.clean_record_with(record, report, |candidate| self.assess(candidate))
    }

    fn clean_record_with<F>(
        &self,
        record: &TripletRecord,
        report: &mut CleanReport,
        check: F,
    ) -> CleanedRecord
    where
        F: Fn(&Value) -> Verdict,
    {
        let candidates: &[Value] = match &record.triplets {
            TripletField::Candidates(candidates) => candidates,
            TripletField::Failed(_) => {
                report.count(RemovalReason::LlmParseError);
                &[]
            }
            TripletField::Other(Value::Object(marker)) if marker.contains_key("error") => {
                report.count(RemovalReason::LlmParseError);
                &[]
            }
            // Null, empty and other non-list values carry no candidates
            TripletField::Other(other) => {
                if !is_empty_value(other) {
                    debug!(chunk = ?record.id, value = %other, "Ignoring non-list triplets field");
                }
                &[]
            }
        };

        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for candidate in candidates {
            report.before += 1;

            let verdict = catch_unwind(AssertUnwindSafe(|| check(candidate)))
                .unwrap_or_else(|_| {
                    error!(chunk = ?record.id, candidate = %candidate, "Candidate check panicked");
                    Verdict::Reject(RemovalReason::Exception)
                });

            match verdict {
                Verdict::Keep(triplet) => {
                    if seen.insert(triplet.clone()) {
                        kept.push(triplet);
                    } else {
                        report.count(RemovalReason::Dup);
                    }
                }
                Verdict::Reject(reason) => report.count(reason),
            }
        }

        report.after += kept.len();

        CleanedRecord {
            id: record.id,
            text: record.text.clone(),
            syntax: record.syntax.clone(),
            entities: record.entities.clone(),
            triplets: kept,
        }
    }

    /// Run the acceptance checks on one candidate, in order.
    pub fn assess(&self, candidate: &Value) -> Verdict {
        let Some([head, relation, tail]) = coerce_candidate(candidate) else {
            return Verdict::Reject(RemovalReason::BadFormat);
        };

        if [&head, &relation, &tail]
            .iter()
            .any(|s| self.is_placeholder(s))
        {
            return Verdict::Reject(RemovalReason::Placeholder);
        }

        if head == tail {
            return Verdict::Reject(RemovalReason::HeadEqTail);
        }

        if !(self.is_valid_entity(&head) && self.is_valid_entity(&tail)) {
            return Verdict::Reject(RemovalReason::InvalidEntity);
        }

        if !self.has_relation_keyword(&relation) {
            return Verdict::Reject(RemovalReason::RelNoKeyword);
        }

        let relation = self.normalize_relation(&relation);
        Verdict::Keep(Triplet::new(head, relation, tail))
    }

    /// Empty, or containing one of the placeholder keywords.
    pub fn is_placeholder(&self, token: &str) -> bool {
        let token = token.trim();
        token.is_empty()
            || self
                .vocabulary
                .placeholder_keywords
                .iter()
                .any(|k| token.contains(k.as_str()))
    }

    pub fn is_valid_entity(&self, entity: &str) -> bool {
        let entity = entity.trim();
        if entity.is_empty() {
            return false;
        }

        let mut chars = entity.chars();
        let single = chars.next().is_some() && chars.next().is_none();
        if single && !self.vocabulary.direction_words.iter().any(|d| d == entity) {
            return false;
        }

        entity
            .chars()
            .any(|c| c.is_alphanumeric() || is_cjk_ideograph(c))
    }

    pub fn has_relation_keyword(&self, relation: &str) -> bool {
        self.vocabulary
            .relation_keywords
            .iter()
            .any(|k| relation.contains(k.as_str()))
    }

    /// Canonical label of the first matching synonym group, else the trimmed input.
    pub fn normalize_relation(&self, relation: &str) -> String {
        let relation = relation.trim();
        self.vocabulary
            .synonym_groups
            .iter()
            .find(|group| group.matches(relation))
            .map(|group| group.canonical.clone())
            .unwrap_or_else(|| relation.to_string())
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// CJK Unified Ideographs block.
fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// `[h, r, t, ...]` with scalar elements, trimmed. Extra elements are ignored.
fn coerce_candidate(candidate: &Value) -> Option<[String; 3]> {
    let items = candidate.as_array().filter(|items| items.len() >= 3)?;
    Some([
        element_text(&items[0])?,
        element_text(&items[1])?,
        element_text(&items[2])?,
    ])
}

fn element_text(element: &Value) -> Option<String> {
    scalar_text(element).map(|s| s.trim().to_string())
}
