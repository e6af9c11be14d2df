use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use index::Neo4jConfig;

use crate::config::{
    ENTITIES_EXTRACTED, ExtractionConfig, ExtractionMode, INDEX, PROCESSED_TEXTS,
    TRIPLETS_CLEANED, TRIPLETS_FINAL,
};

#[derive(Parser, Debug)]
#[command(name = "urbangraph")]
#[command(about = "Build a knowledge graph from urban-planning documents", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a document and split it into chunks
    Data {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(short, long, default_value = PROCESSED_TEXTS)]
        output: PathBuf,
        /// Token budget per chunk
        #[arg(long, default_value_t = 512)]
        max_tokens: usize,
    },
    /// Label the entities of every chunk
    Ner {
        #[arg(short, long, default_value = PROCESSED_TEXTS)]
        input: PathBuf,
        #[arg(short, long, default_value = ENTITIES_EXTRACTED)]
        output: PathBuf,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Extract candidate triplets from labelled chunks
    Re {
        #[arg(short, long, default_value = ENTITIES_EXTRACTED)]
        input: PathBuf,
        #[arg(short, long, default_value = TRIPLETS_FINAL)]
        output: PathBuf,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Filter and normalize candidate triplets
    Clean {
        #[arg(short, long, default_value = TRIPLETS_FINAL)]
        input: PathBuf,
        #[arg(short, long, default_value = TRIPLETS_CLEANED)]
        output: PathBuf,
        /// TOML file overriding the keyword tables
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
    /// Build the entity -> triplet index
    Index {
        #[arg(short, long, default_value = TRIPLETS_CLEANED)]
        input: PathBuf,
        #[arg(short, long, default_value = INDEX)]
        output: PathBuf,
    },
    /// Load triplets into Neo4j
    Import {
        #[arg(short, long, default_value = TRIPLETS_CLEANED)]
        input: PathBuf,
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
    /// Check the Neo4j connection and print graph statistics
    Check {
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
    /// Summarize a triplet file
    Show {
        #[arg(short, long, default_value = TRIPLETS_CLEANED)]
        input: PathBuf,
    },
    /// Run every stage from document to index
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// Directory for the stage files
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
        #[arg(long, default_value_t = 512)]
        max_tokens: usize,
        #[command(flatten)]
        extraction: ExtractionArgs,
        #[arg(long)]
        vocabulary: Option<PathBuf>,
        /// Also load the cleaned triplets into Neo4j
        #[arg(long)]
        import_neo4j: bool,
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Plain text or Markdown document
    #[arg(long)]
    pub text: Option<PathBuf>,
    /// PDF document
    #[arg(long)]
    pub pdf: Option<PathBuf>,
}

impl SourceArgs {
    pub fn path(&self) -> Option<&PathBuf> {
        self.text.as_ref().or(self.pdf.as_ref())
    }
}

#[derive(Args, Debug)]
pub struct ExtractionArgs {
    #[arg(long, value_enum, default_value_t = ExtractionMode::Llm)]
    pub mode: ExtractionMode,
    /// Chat model, overrides GRAPHRAG_CHAT_MODEL / OPENAI_MODEL
    #[arg(long)]
    pub model: Option<String>,
    /// Concepts the relation prompt centres on
    #[arg(long, value_delimiter = ',', default_value = "城市更新")]
    pub core_concepts: Vec<String>,
}

impl From<ExtractionArgs> for ExtractionConfig {
    fn from(args: ExtractionArgs) -> Self {
        Self {
            mode: args.mode,
            model: args.model,
            core_concepts: args.core_concepts,
        }
    }
}

#[derive(Args, Debug)]
pub struct Neo4jArgs {
    #[arg(long = "uri", env = "NEO4J_URI", default_value = "bolt://localhost:7687")]
    pub neo4j_uri: String,
    #[arg(long = "user", env = "NEO4J_USER", default_value = "neo4j")]
    pub neo4j_user: String,
    #[arg(long = "password", env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub neo4j_password: Option<String>,
    #[arg(long = "database", env = "NEO4J_DATABASE")]
    pub neo4j_database: Option<String>,
    /// Upserts per transaction
    #[arg(long, default_value_t = 500)]
    pub batch_size: usize,
}

impl Neo4jArgs {
    pub fn into_config(self) -> anyhow::Result<Neo4jConfig> {
        let password = self.neo4j_password.ok_or_else(|| {
            anyhow::anyhow!("Neo4j password missing: pass --password or set NEO4J_PASSWORD")
        })?;

        Ok(Neo4jConfig {
            uri: self.neo4j_uri,
            user: self.neo4j_user,
            password,
            database: self.neo4j_database,
            batch_size: self.batch_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["urbangraph", "data"]).is_err());
        assert!(
            Cli::try_parse_from(["urbangraph", "data", "--text", "a.txt", "--pdf", "b.pdf"])
                .is_err()
        );

        let cli = Cli::try_parse_from(["urbangraph", "data", "--pdf", "plan.pdf"]).unwrap();
        match cli.command {
            Commands::Data { source, output, max_tokens } => {
                assert_eq!(source.path(), Some(&PathBuf::from("plan.pdf")));
                assert_eq!(output, PathBuf::from("processed_texts.json"));
                assert_eq!(max_tokens, 512);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_demo_alias_and_concepts() {
        let cli = Cli::try_parse_from([
            "urbangraph",
            "re",
            "--mode",
            "demo",
            "--core-concepts",
            "城市更新,绿色发展",
        ])
        .unwrap();

        match cli.command {
            Commands::Re { extraction, input, .. } => {
                assert_eq!(input, PathBuf::from("entities_extracted.json"));
                let config = ExtractionConfig::from(extraction);
                assert_eq!(config.mode, ExtractionMode::Rules);
                assert_eq!(config.core_concepts, vec!["城市更新", "绿色发展"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_import_connection_flags() {
        let cli = Cli::try_parse_from([
            "urbangraph",
            "import",
            "--uri",
            "bolt://db:7687",
            "--password",
            "pw",
            "--database",
            "planning",
        ])
        .unwrap();

        match cli.command {
            Commands::Import { input, neo4j } => {
                assert_eq!(input, PathBuf::from("triplets_cleaned.json"));
                let config = neo4j.into_config().unwrap();
                assert_eq!(config.uri, "bolt://db:7687");
                assert_eq!(config.user, "neo4j");
                assert_eq!(config.database.as_deref(), Some("planning"));
                assert_eq!(config.batch_size, 500);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_neo4j_password_required_for_config() {
        let args = Neo4jArgs {
            neo4j_uri: "bolt://db:7687".into(),
            neo4j_user: "neo4j".into(),
            neo4j_password: None,
            neo4j_database: None,
            batch_size: 500,
        };
        assert!(args.into_config().is_err());
    }
}
