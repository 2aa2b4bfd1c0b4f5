//! Search subcommand - list, keyword and detail lookups over an index

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde_json::Value;

use oaindex_ingest::{
    BackendError, ElasticClient, Pagination, RecordType, SearchBackend, SearchPage, SearchRequest,
    next_cursor,
};

use super::{TypeArg, styled_table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Record type to query
    #[arg(value_enum)]
    pub record_type: TypeArg,

    /// Match text against the type's title/display_name field
    #[arg(short, long, conflicts_with = "id")]
    pub keyword: Option<String>,

    /// Fetch a single document by exact id
    #[arg(long)]
    pub id: Option<String>,

    /// Page number (1-based, offset pagination)
    #[arg(short, long, conflicts_with = "after")]
    pub page: Option<usize>,

    /// Page size
    #[arg(short, long)]
    pub size: Option<usize>,

    /// Cursor from a previous page: a JSON array of sort values, or a bare id
    #[arg(short, long)]
    pub after: Option<String>,

    /// Print hits as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Backend URL
    #[arg(long)]
    pub url: Option<String>,
}

fn parse_cursor(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(values)) => values,
        _ => vec![Value::String(raw.to_string())],
    }
}

fn build_request(args: &SearchArgs, record_type: RecordType) -> SearchRequest {
    if let Some(id) = &args.id {
        return SearchRequest::detail(id);
    }
    let cursor = args.after.as_deref().map(parse_cursor).unwrap_or_default();
    let pagination = Pagination::new(args.page, args.size, cursor);
    match &args.keyword {
        Some(text) => SearchRequest::keyword(record_type, text, pagination),
        None => SearchRequest::list(pagination),
    }
}

pub fn run(args: SearchArgs, config: &Config) -> Result<()> {
    let record_type = RecordType::from(args.record_type);
    let overrides = config.overrides(record_type);
    let index = overrides
        .name
        .unwrap_or_else(|| record_type.index_name().to_string());

    let es = config.elastic_config(args.url.as_deref(), Some(config.backend.query_timeout_secs));
    let client = ElasticClient::connect(&es)
        .with_context(|| format!("Failed to set up client for {}", es.url))?;
    let request = build_request(&args, record_type);

    let page = match client.search(&index, &request) {
        Ok(page) => page,
        Err(e @ BackendError::Unavailable(_)) => {
            anyhow::bail!("Search backend unavailable at {}: {e}", client.base_url())
        }
        Err(e) => return Err(e).with_context(|| format!("Search on '{index}' failed")),
    };

    if args.json {
        for hit in &page.hits {
            println!("{}", Value::Object(hit.source.clone()));
        }
    } else {
        print_hits(&page, record_type);
    }
    if let Some(cursor) = next_cursor(&page) {
        if page.hits.len() == request.pagination.size() {
            eprintln!("next: --after '{}'", Value::Array(cursor));
        }
    }
    Ok(())
}

fn print_hits(page: &SearchPage, record_type: RecordType) {
    let field = record_type.config().keyword_field;
    let mut table = styled_table(&["id", field]);
    for hit in &page.hits {
        let label = hit.source.get(field).and_then(Value::as_str).unwrap_or("");
        table.add_row(vec![Cell::new(&hit.id), Cell::new(label)]);
    }
    eprintln!("\n{table}");
    eprintln!("{} of {} hits", page.hits.len(), page.total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(keyword: Option<&str>, id: Option<&str>, after: Option<&str>) -> SearchArgs {
        SearchArgs {
            record_type: TypeArg::Source,
            keyword: keyword.map(String::from),
            id: id.map(String::from),
            page: Some(2),
            size: Some(25),
            after: after.map(String::from),
            json: false,
            url: None,
        }
    }

    #[test]
    fn cursor_accepts_json_or_bare_id() {
        assert_eq!(parse_cursor(r#"["S9", 3]"#), vec![json!("S9"), json!(3)]);
        assert_eq!(
            parse_cursor("https://openalex.org/S9"),
            vec![json!("https://openalex.org/S9")]
        );
    }

    #[test]
    fn id_wins_over_listing() {
        let req = build_request(&args(None, Some("S1"), None), RecordType::Source);
        assert_eq!(req, SearchRequest::detail("S1"));
    }

    #[test]
    fn keyword_with_offset() {
        let req = build_request(&args(Some("nature"), None, None), RecordType::Source);
        assert_eq!(req.to_body()["from"], json!(25));
        assert_eq!(req.to_body()["query"], json!({"match": {"display_name": "nature"}}));
    }

    #[test]
    fn after_switches_to_cursor() {
        let req = build_request(&args(None, None, Some("S100")), RecordType::Source);
        assert_eq!(req.to_body()["search_after"], json!(["S100"]));
    }
}
