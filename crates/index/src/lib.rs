pub mod inverted_index;
pub mod neo4j_index;

pub use inverted_index::{InvertedIndex, Occurrence};
pub use neo4j_index::{
    GraphStats, ImportPlan, Neo4jConfig, Neo4jIndexer, TripletUpsert, sanitize_relation_type,
};
