//! Index schemas: field mappings and index-level settings per record type

use serde_json::{Map, Value, json};

use crate::record_type::RecordType;

/// Mapping type of one document field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Keyword,
    Text,
    Integer,
    Float,
    Double,
    Boolean,
    Date,
    /// Nested objects with their own sub-fields
    Nested(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldType,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldType) -> Self {
        Self { name, kind }
    }
}

fn keyword(name: &'static str) -> Field {
    Field::new(name, FieldType::Keyword)
}

fn text(name: &'static str) -> Field {
    Field::new(name, FieldType::Text)
}

fn integer(name: &'static str) -> Field {
    Field::new(name, FieldType::Integer)
}

fn nested(name: &'static str, fields: Vec<Field>) -> Field {
    Field::new(name, FieldType::Nested(fields))
}

/// Index-level settings
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    pub shards: u32,
    pub replicas: u32,
    /// `index.mapping.nested_objects.limit`; None keeps the backend default
    pub nested_objects_limit: Option<u64>,
    pub refresh_interval: Option<String>,
    pub translog_durability: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            shards: 5,
            replicas: 1,
            nested_objects_limit: None,
            refresh_interval: None,
            translog_durability: None,
        }
    }
}

/// Per-index configuration overrides (all optional)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOverrides {
    pub name: Option<String>,
    pub shards: Option<u32>,
    pub replicas: Option<u32>,
    pub refresh_interval: Option<String>,
    pub translog_durability: Option<String>,
}

/// Field mappings plus settings for one index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    pub fields: Vec<Field>,
    pub settings: IndexSettings,
}

fn counts_by_year() -> Field {
    nested(
        "counts_by_year",
        vec![integer("year"), integer("works_count"), integer("cited_by_count")],
    )
}

fn summary_stats() -> Field {
    nested(
        "summary_stats",
        vec![
            Field::new("2yr_mean_citedness", FieldType::Double),
            integer("h_index"),
            integer("i10_index"),
        ],
    )
}

fn work_schema() -> IndexSchema {
    let fields = vec![
        keyword("id"),
        text("title"),
        nested(
            "authorships",
            vec![
                nested(
                    "author",
                    vec![keyword("id"), keyword("display_name"), keyword("orcid")],
                ),
                keyword("author_position"),
                keyword("countries"),
            ],
        ),
        nested(
            "best_oa_location",
            vec![
                Field::new("is_oa", FieldType::Boolean),
                keyword("landing_page_url"),
                keyword("pdf_url"),
                nested(
                    "source",
                    vec![
                        keyword("id"),
                        keyword("display_name"),
                        keyword("issn_l"),
                        keyword("issn"),
                        keyword("host_organization"),
                        keyword("type"),
                    ],
                ),
                keyword("license"),
                keyword("version"),
            ],
        ),
        integer("cited_by_count"),
        nested(
            "concepts",
            vec![
                keyword("id"),
                keyword("wikidata"),
                keyword("display_name"),
                integer("level"),
                Field::new("score", FieldType::Float),
            ],
        ),
        counts_by_year(),
        Field::new("created_date", FieldType::Date),
        keyword("language"),
        keyword("type"),
        Field::new("publication_date", FieldType::Date),
        keyword("referenced_works"),
        keyword("related_works"),
        text("abstract"),
    ];
    IndexSchema {
        fields,
        settings: IndexSettings {
            replicas: 0,
            // authorship/concept/location objects are numerous per work
            nested_objects_limit: Some(500_000),
            ..Default::default()
        },
    }
}

fn source_schema() -> IndexSchema {
    let fields = vec![
        keyword("id"),
        integer("cited_by_count"),
        counts_by_year(),
        text("display_name"),
        text("homepage_url"),
        keyword("host_organization"),
        keyword("host_organization_lineage"),
        text("host_organization_name"),
        summary_stats(),
        keyword("type"),
        text("updated_date"),
        text("works_api_url"),
        integer("works_count"),
        text("abstract"),
    ];
    IndexSchema {
        fields,
        settings: IndexSettings::default(),
    }
}

fn institution_schema() -> IndexSchema {
    let fields = vec![
        keyword("id"),
        keyword("ror"),
        text("display_name"),
        keyword("display_name_acronyms"),
        text("display_name_alternatives"),
        keyword("country_code"),
        keyword("type"),
        keyword("homepage_url"),
        keyword("image_url"),
        nested(
            "geo",
            vec![
                keyword("city"),
                keyword("geonames_city_id"),
                keyword("region"),
                keyword("country_code"),
                keyword("country"),
                Field::new("latitude", FieldType::Double),
                Field::new("longitude", FieldType::Double),
            ],
        ),
        integer("cited_by_count"),
        integer("works_count"),
        counts_by_year(),
        summary_stats(),
        text("updated_date"),
        text("works_api_url"),
        text("abstract"),
    ];
    IndexSchema {
        fields,
        settings: IndexSettings::default(),
    }
}

fn author_schema() -> IndexSchema {
    let institution = || {
        vec![
            keyword("id"),
            keyword("ror"),
            keyword("display_name"),
            keyword("country_code"),
            keyword("type"),
        ]
    };
    let fields = vec![
        keyword("id"),
        keyword("orcid"),
        text("display_name"),
        text("display_name_alternatives"),
        nested("last_known_institutions", institution()),
        nested(
            "affiliations",
            vec![nested("institution", institution()), integer("years")],
        ),
        integer("cited_by_count"),
        integer("works_count"),
        counts_by_year(),
        summary_stats(),
        text("updated_date"),
        text("works_api_url"),
        text("abstract"),
    ];
    IndexSchema {
        fields,
        settings: IndexSettings::default(),
    }
}

fn field_mapping(kind: &FieldType) -> Value {
    match kind {
        FieldType::Keyword => json!({"type": "keyword"}),
        FieldType::Text => json!({"type": "text"}),
        FieldType::Integer => json!({"type": "integer"}),
        FieldType::Float => json!({"type": "float"}),
        FieldType::Double => json!({"type": "double"}),
        FieldType::Boolean => json!({"type": "boolean"}),
        FieldType::Date => json!({"type": "date"}),
        FieldType::Nested(fields) => json!({
            "type": "nested",
            "properties": properties(fields),
        }),
    }
}

fn properties(fields: &[Field]) -> Value {
    let props: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.to_string(), field_mapping(&f.kind)))
        .collect();
    Value::Object(props)
}

impl IndexSchema {
    /// Built-in schema for a record type
    pub fn for_record_type(record_type: RecordType) -> Self {
        match record_type {
            RecordType::Work => work_schema(),
            RecordType::Source => source_schema(),
            RecordType::Institution => institution_schema(),
            RecordType::Author => author_schema(),
        }
    }

    /// Apply configured setting overrides (the index name is handled by the caller)
    pub fn with_overrides(mut self, overrides: &IndexOverrides) -> Self {
        if let Some(shards) = overrides.shards {
            self.settings.shards = shards;
        }
        if let Some(replicas) = overrides.replicas {
            self.settings.replicas = replicas;
        }
        if let Some(ref interval) = overrides.refresh_interval {
            self.settings.refresh_interval = Some(interval.clone());
        }
        if let Some(ref durability) = overrides.translog_durability {
            self.settings.translog_durability = Some(durability.clone());
        }
        self
    }

    /// Top-level field names, in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn mappings_json(&self) -> Value {
        json!({ "properties": properties(&self.fields) })
    }

    pub fn settings_json(&self) -> Value {
        let s = &self.settings;
        let mut index = Map::new();
        index.insert("number_of_shards".into(), json!(s.shards));
        index.insert("number_of_replicas".into(), json!(s.replicas));
        if let Some(limit) = s.nested_objects_limit {
            index.insert("mapping.nested_objects.limit".into(), json!(limit));
        }
        if let Some(ref interval) = s.refresh_interval {
            index.insert("refresh_interval".into(), json!(interval));
        }
        if let Some(ref durability) = s.translog_durability {
            index.insert("translog.durability".into(), json!(durability));
        }
        json!({ "index": index })
    }

    /// Body for a create-index request
    pub fn to_create_body(&self) -> Value {
        json!({
            "settings": self.settings_json(),
            "mappings": self.mappings_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_cover_projected_fields() {
        for rt in RecordType::all() {
            let schema = IndexSchema::for_record_type(*rt);
            let names: Vec<_> = schema.field_names().collect();
            let mut expected: Vec<&str> = rt.config().fields.to_vec();
            expected.push("abstract");
            let mut sorted_names = names.clone();
            sorted_names.sort_unstable();
            expected.sort_unstable();
            assert_eq!(sorted_names, expected, "{rt}");
        }
    }

    #[test]
    fn work_raises_nested_limit() {
        let body = IndexSchema::for_record_type(RecordType::Work).to_create_body();
        let index = &body["settings"]["index"];
        assert_eq!(index["mapping.nested_objects.limit"], json!(500_000));
        assert_eq!(index["number_of_shards"], json!(5));
        assert_eq!(index["number_of_replicas"], json!(0));
    }

    #[test]
    fn source_uses_defaults() {
        let body = IndexSchema::for_record_type(RecordType::Source).to_create_body();
        let index = body["settings"]["index"].as_object().unwrap();
        assert_eq!(index["number_of_replicas"], json!(1));
        assert!(!index.contains_key("mapping.nested_objects.limit"));
        assert!(!index.contains_key("refresh_interval"));
    }

    #[test]
    fn nested_fields_render_properties() {
        let mappings = IndexSchema::for_record_type(RecordType::Work).mappings_json();
        let author = &mappings["properties"]["authorships"]["properties"]["author"];
        assert_eq!(author["type"], json!("nested"));
        assert_eq!(author["properties"]["orcid"]["type"], json!("keyword"));
        assert_eq!(
            mappings["properties"]["concepts"]["properties"]["score"]["type"],
            json!("float")
        );
        assert_eq!(mappings["properties"]["abstract"]["type"], json!("text"));
    }

    #[test]
    fn overrides_apply() {
        let schema = IndexSchema::for_record_type(RecordType::Source).with_overrides(
            &IndexOverrides {
                shards: Some(1),
                replicas: Some(0),
                refresh_interval: Some("-1".into()),
                translog_durability: Some("async".into()),
                ..Default::default()
            },
        );
        let index = &schema.settings_json()["index"];
        assert_eq!(index["number_of_shards"], json!(1));
        assert_eq!(index["number_of_replicas"], json!(0));
        assert_eq!(index["refresh_interval"], json!("-1"));
        assert_eq!(index["translog.durability"], json!("async"));
    }

    #[test]
    fn id_is_keyword_everywhere() {
        for rt in RecordType::all() {
            let schema = IndexSchema::for_record_type(*rt);
            assert_eq!(schema.fields[0], Field::new("id", FieldType::Keyword), "{rt}");
        }
    }
}
