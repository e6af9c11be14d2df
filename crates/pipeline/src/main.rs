use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pipeline::cli::{Cli, Commands};
use pipeline::config::{ExtractionConfig, load_vocabulary};
use pipeline::{PipelineOptions, run_pipeline, stages};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    dispatch(cli.command).await
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Data {
            source,
            output,
            max_tokens,
        } => {
            let path = source
                .path()
                .ok_or_else(|| anyhow::anyhow!("either --text or --pdf is required"))?;
            stages::run_data(path, &output, max_tokens).await?;
        }
        Commands::Ner {
            input,
            output,
            extraction,
        } => {
            let extractor = ExtractionConfig::from(extraction).build_extractor()?;
            stages::run_ner(&input, &output, &extractor).await?;
        }
        Commands::Re {
            input,
            output,
            extraction,
        } => {
            let extractor = ExtractionConfig::from(extraction).build_extractor()?;
            stages::run_re(&input, &output, &extractor).await?;
        }
        Commands::Clean {
            input,
            output,
            vocabulary,
        } => {
            let vocabulary = load_vocabulary(vocabulary.as_ref())?;
            stages::run_clean(&input, &output, vocabulary).await?;
        }
        Commands::Index { input, output } => {
            stages::run_index(&input, &output).await?;
        }
        Commands::Import { input, neo4j } => {
            stages::run_import(&input, &neo4j.into_config()?).await?;
        }
        Commands::Check { neo4j } => {
            stages::run_check(&neo4j.into_config()?).await?;
        }
        Commands::Show { input } => {
            stages::run_show(&input).await?;
        }
        Commands::Run {
            source,
            workdir,
            max_tokens,
            extraction,
            vocabulary,
            import_neo4j,
            neo4j,
        } => {
            let source = source
                .path()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("either --text or --pdf is required"))?;
            // Credentials are only demanded when the import is requested
            let neo4j = if import_neo4j {
                Some(neo4j.into_config()?)
            } else {
                None
            };

            run_pipeline(PipelineOptions {
                source,
                workdir,
                max_tokens,
                extraction: extraction.into(),
                vocabulary,
                neo4j,
            })
            .await?;
        }
    }

    Ok(())
}
