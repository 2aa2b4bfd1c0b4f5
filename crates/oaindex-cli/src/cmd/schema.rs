//! Schema subcommand - create the target indexes without ingesting

use anyhow::{Context, Result};
use clap::Args;

use oaindex_ingest::{ElasticClient, IndexTarget, ensure_all};

use super::{TypeArg, print_summary, record_types};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Record types (default: all)
    #[arg(value_enum)]
    pub types: Vec<TypeArg>,

    /// Print the create-index bodies as JSON instead of contacting the backend
    #[arg(long)]
    pub print: bool,

    /// Backend URL
    #[arg(long)]
    pub url: Option<String>,
}

pub fn run(args: SchemaArgs, config: &Config) -> Result<()> {
    let targets: Vec<IndexTarget> = record_types(&args.types)
        .into_iter()
        .map(|rt| IndexTarget::new(rt, &config.overrides(rt)))
        .collect();

    if args.print {
        let bodies: serde_json::Map<String, serde_json::Value> = targets
            .iter()
            .map(|t| (t.index.clone(), t.schema.to_create_body()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&bodies)?);
        return Ok(());
    }

    let es = config.elastic_config(args.url.as_deref(), Some(config.backend.query_timeout_secs));
    let client = ElasticClient::connect(&es)
        .with_context(|| format!("Failed to set up client for {}", es.url))?;
    let created = ensure_all(&client, &targets)
        .with_context(|| format!("Failed to ensure indexes on {}", client.base_url()))?;

    let rows: Vec<(&str, String)> = targets
        .iter()
        .map(|t| {
            let s = &t.schema.settings;
            (
                t.index.as_str(),
                format!("{} fields, {} shards, {} replicas", t.schema.fields.len(), s.shards, s.replicas),
            )
        })
        .collect();
    print_summary("Index", &rows);
    log::info!("{created} of {} indexes created", targets.len());
    Ok(())
}
