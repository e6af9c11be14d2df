use anyhow::{Context, Result};
use neo4rs::{ConfigBuilder, Graph, Query};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

use extract::TripletRecord;
use extract::schema::scalar_text;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Server default database when unset
    pub database: Option<String>,
    /// Upserts per transaction
    pub batch_size: usize,
}

impl Neo4jConfig {
    pub fn new(password: String) -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password,
            database: None,
            batch_size: 500,
        }
    }

    pub async fn connect(&self) -> Result<Graph> {
        let mut builder = ConfigBuilder::default()
            .uri(self.uri.as_str())
            .user(self.user.as_str())
            .password(self.password.as_str());
        if let Some(database) = &self.database {
            builder = builder.db(database.as_str());
        }

        let config = builder.build().context("Invalid Neo4j configuration")?;
        Graph::connect(config)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", self.uri))
    }
}

/// Turn a free-text relation label into a relationship type.
///
/// Non-word runs become `_`, labels not starting with an ASCII letter get an
/// `R_` prefix, and the result is uppercased. Never empty.
pub fn sanitize_relation_type(relation: &str) -> String {
    let replaced = NON_WORD.replace_all(relation, "_");
    let mut sanitized = replaced.trim_matches('_').to_string();

    if sanitized.is_empty() {
        sanitized = "REL".to_string();
    }
    if !sanitized.starts_with(|c: char| c.is_ascii_alphabetic()) {
        sanitized = format!("R_{}", sanitized);
    }

    sanitized.to_uppercase()
}

/// One `MERGE` of a head node, tail node and the edge between them.
#[derive(Debug, Clone, PartialEq)]
pub struct TripletUpsert {
    pub head: String,
    pub relation: String,
    pub tail: String,
    pub relation_type: String,
}

impl TripletUpsert {
    pub fn cypher(&self) -> String {
        // Relationship types cannot be parameters; the sanitized type holds no backticks
        format!(
            "MERGE (a:Entity {{name: $head}}) \
             MERGE (b:Entity {{name: $tail}}) \
             MERGE (a)-[r:`{}`]->(b) SET r.name = $rel",
            self.relation_type
        )
    }

    pub fn to_query(&self) -> Query {
        Query::new(self.cypher())
            .param("head", self.head.clone())
            .param("tail", self.tail.clone())
            .param("rel", self.relation.clone())
    }
}

/// Upserts for every well-formed triplet, plus the number of candidates skipped.
#[derive(Debug, Default)]
pub struct ImportPlan {
    pub upserts: Vec<TripletUpsert>,
    pub skipped: usize,
}

impl ImportPlan {
    pub fn from_records(records: &[TripletRecord]) -> Self {
        let mut plan = ImportPlan::default();

        for record in records {
            let total = record.triplets.len();
            let mut planned = 0;

            for candidate in record.triplets.well_formed() {
                let parts = (
                    scalar_text(&candidate[0]),
                    scalar_text(&candidate[1]),
                    scalar_text(&candidate[2]),
                );
                if let (Some(head), Some(relation), Some(tail)) = parts {
                    plan.upserts.push(TripletUpsert {
                        relation_type: sanitize_relation_type(&relation),
                        head,
                        relation,
                        tail,
                    });
                    planned += 1;
                }
            }

            plan.skipped += total - planned;
        }

        plan
    }
}

#[derive(Debug, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub relation_count: usize,
    pub label_sets: Vec<Vec<String>>,
    pub samples: Vec<(String, String, String)>,
}

pub struct Neo4jIndexer {
    graph: Graph,
    batch_size: usize,
}

impl Neo4jIndexer {
    pub fn new(graph: Graph, batch_size: usize) -> Self {
        Self {
            graph,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let graph = config.connect().await?;
        Ok(Self::new(graph, config.batch_size))
    }

    /// Initialize schema: index on Entity.name
    pub async fn init_schema(&self) -> Result<()> {
        let query = Query::new(
            "CREATE INDEX entity_name_index IF NOT EXISTS FOR (e:Entity) ON (e.name)".to_string(),
        );
        self.graph
            .run(query)
            .await
            .context("Failed to create index on Entity.name")?;

        debug!("Neo4j schema ready");
        Ok(())
    }

    /// Run the plan, one transaction per batch. Returns the number of upserts applied.
    pub async fn import(&self, plan: &ImportPlan, mut on_batch: impl FnMut(usize)) -> Result<usize> {
        let mut applied = 0;

        for (batch_no, batch) in plan.upserts.chunks(self.batch_size).enumerate() {
            let mut txn = self
                .graph
                .start_txn()
                .await
                .context("Failed to start Neo4j transaction")?;

            let queries: Vec<Query> = batch.iter().map(TripletUpsert::to_query).collect();
            txn.run_queries(queries)
                .await
                .with_context(|| format!("Failed to import batch {}", batch_no + 1))?;
            txn.commit()
                .await
                .with_context(|| format!("Failed to commit batch {}", batch_no + 1))?;

            applied += batch.len();
            on_batch(batch.len());
        }

        info!(
            upserts = applied,
            skipped = plan.skipped,
            "Triplets imported into Neo4j"
        );
        Ok(applied)
    }

    pub async fn ping(&self) -> Result<()> {
        self.graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .context("Neo4j is not reachable")
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }

    /// Get graph statistics
    pub async fn get_stats(&self) -> Result<GraphStats> {
        let node_count = self.count("MATCH (n) RETURN count(n) AS count").await?;
        let relation_count = self.count("MATCH ()-[r]->() RETURN count(r) AS count").await?;

        let mut label_sets = Vec::new();
        let mut samples = Vec::new();

        if node_count > 0 {
            let mut result = self
                .graph
                .execute(Query::new(
                    "MATCH (n) RETURN DISTINCT labels(n) AS labels LIMIT 10".to_string(),
                ))
                .await?;
            while let Some(row) = result.next().await? {
                label_sets.push(row.get::<Vec<String>>("labels").unwrap_or_default());
            }

            let mut result = self
                .graph
                .execute(Query::new(
                    "MATCH (a)-[r]->(b) RETURN a.name AS head, type(r) AS rel, b.name AS tail LIMIT 5"
                        .to_string(),
                ))
                .await?;
            while let Some(row) = result.next().await? {
                samples.push((
                    row.get::<String>("head").unwrap_or_default(),
                    row.get::<String>("rel").unwrap_or_default(),
                    row.get::<String>("tail").unwrap_or_default(),
                ));
            }
        }

        Ok(GraphStats {
            node_count,
            relation_count,
            label_sets,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_relation_type() {
        assert_eq!(sanitize_relation_type("推进"), "R_推进");
        assert_eq!(sanitize_relation_type("set up"), "SET_UP");
        assert_eq!(sanitize_relation_type("  promotes -> growth "), "PROMOTES_GROWTH");
        assert_eq!(sanitize_relation_type("!!"), "REL");
        assert_eq!(sanitize_relation_type("2035目标"), "R_2035目标");
        assert_eq!(sanitize_relation_type("`drop`"), "DROP");
    }

    #[test]
    fn test_plan_skips_malformed() {
        let records: Vec<TripletRecord> = serde_json::from_value(json!([
            {"id": 1, "text": "a", "triplets": [["政府", "推进", "绿化"], ["bad"], ["x", null, "y"]]},
            {"id": 2, "text": "b", "triplets": {"error": "parse failed"}},
            {"id": 3, "text": "c", "triplets": [["北", "发展", "公园", "extra"]]},
        ]))
        .unwrap();

        let plan = ImportPlan::from_records(&records);
        assert_eq!(plan.upserts.len(), 2);
        assert_eq!(plan.skipped, 2);
        assert_eq!(plan.upserts[1].tail, "公园");
        assert_eq!(plan.upserts[1].relation_type, "R_发展");
    }

    #[test]
    fn test_upsert_cypher() {
        let upsert = TripletUpsert {
            head: "政府".into(),
            relation: "推进".into(),
            tail: "绿化".into(),
            relation_type: sanitize_relation_type("推进"),
        };
        let cypher = upsert.cypher();
        assert!(cypher.contains("MERGE (a:Entity {name: $head})"));
        assert!(cypher.contains("MERGE (a)-[r:`R_推进`]->(b) SET r.name = $rel"));
    }

    #[test]
    fn test_password_is_not_serialized() {
        let config = Neo4jConfig::new("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("bolt://localhost:7687"));
    }
}
