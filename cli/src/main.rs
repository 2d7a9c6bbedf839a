use anyhow::Result;
use clap::{Parser, Subcommand};
use nodematch::{IndexConfig, NumericValue};
use nodematch_cli::{describe_encoding, parse_query, Corpus};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nodematch")]
#[command(about = "Node-level search over tuple-structured documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index input JSON/JSONL files in memory and run one query
    Search {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Query as JSON, or @path to a file holding it
        #[arg(long)]
        query: String,
        /// Index schema (JSON); defaults to a single two-layer text field `content`
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Field receiving the `tuples` shorthand of input documents
        #[arg(long, default_value = "content")]
        tuple_field: String,
    },
    /// Print the terms a numeric value is indexed under
    Encode {
        /// Value as JSON, e.g. {"long":500}
        #[arg(long)]
        value: String,
        #[arg(long, default_value_t = 4)]
        precision_step: u32,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { input, query, schema, tuple_field } => {
            let config = match schema {
                Some(path) => IndexConfig::load(path)?,
                None => IndexConfig::default(),
            };
            let query = parse_query(&query)?;
            let mut corpus = Corpus::new(config, tuple_field);
            corpus.load(&input)?;
            let hits = corpus.search(&query)?;
            tracing::info!(hits = hits.len(), "query evaluated");
            for hit in hits {
                println!("{}", serde_json::to_string(&hit)?);
            }
            Ok(())
        }
        Commands::Encode { value, precision_step } => {
            let value: NumericValue = serde_json::from_str(&value)?;
            for line in describe_encoding(value, precision_step)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}
