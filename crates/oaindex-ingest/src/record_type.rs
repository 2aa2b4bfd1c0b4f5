//! Record types and their per-type projection rules

use std::fmt;

/// Snapshot record types that can be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Scholarly works (papers, books, datasets)
    Work,
    /// Journals, repositories, conferences
    Source,
    /// Universities and research organizations
    Institution,
    /// Researchers
    Author,
}

/// Projection rules consulted by the decoder for one record type.
#[derive(Debug)]
pub struct RecordTypeConfig {
    /// Whitelisted fields, in output order
    pub fields: &'static [&'static str],
    /// Fields that must be present and non-empty for a record to be indexed
    pub required: &'static [&'static str],
    /// Derive `abstract` from `abstract_inverted_index`
    pub reconstruct_abstract: bool,
    /// Field matched by keyword search
    pub keyword_field: &'static str,
}

static WORK: RecordTypeConfig = RecordTypeConfig {
    fields: &[
        "id",
        "title",
        "authorships",
        "best_oa_location",
        "cited_by_count",
        "concepts",
        "counts_by_year",
        "created_date",
        "language",
        "type",
        "publication_date",
        "referenced_works",
        "related_works",
    ],
    required: &["id", "title"],
    reconstruct_abstract: true,
    keyword_field: "title",
};

static SOURCE: RecordTypeConfig = RecordTypeConfig {
    fields: &[
        "id",
        "cited_by_count",
        "counts_by_year",
        "display_name",
        "homepage_url",
        "host_organization",
        "host_organization_lineage",
        "host_organization_name",
        "summary_stats",
        "type",
        "updated_date",
        "works_api_url",
        "works_count",
    ],
    required: &["id"],
    reconstruct_abstract: false,
    keyword_field: "display_name",
};

static INSTITUTION: RecordTypeConfig = RecordTypeConfig {
    fields: &[
        "id",
        "ror",
        "display_name",
        "display_name_acronyms",
        "display_name_alternatives",
        "country_code",
        "type",
        "homepage_url",
        "image_url",
        "geo",
        "cited_by_count",
        "works_count",
        "counts_by_year",
        "summary_stats",
        "updated_date",
        "works_api_url",
    ],
    required: &["id"],
    reconstruct_abstract: false,
    keyword_field: "display_name",
};

static AUTHOR: RecordTypeConfig = RecordTypeConfig {
    fields: &[
        "id",
        "orcid",
        "display_name",
        "display_name_alternatives",
        "last_known_institutions",
        "affiliations",
        "cited_by_count",
        "works_count",
        "counts_by_year",
        "summary_stats",
        "updated_date",
        "works_api_url",
    ],
    required: &["id"],
    reconstruct_abstract: false,
    keyword_field: "display_name",
};

impl RecordType {
    /// Parse from singular or plural name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "work" | "works" => Some(Self::Work),
            "source" | "sources" => Some(Self::Source),
            "institution" | "institutions" => Some(Self::Institution),
            "author" | "authors" => Some(Self::Author),
            _ => None,
        }
    }

    /// Snapshot folder holding this type's dated subfolders
    pub fn folder_name(&self) -> &'static str {
        match self {
            Self::Work => "works",
            Self::Source => "sources",
            Self::Institution => "institutions",
            Self::Author => "authors",
        }
    }

    /// Default target index
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Source => "source",
            Self::Institution => "institution",
            Self::Author => "author",
        }
    }

    pub fn config(&self) -> &'static RecordTypeConfig {
        match self {
            Self::Work => &WORK,
            Self::Source => &SOURCE,
            Self::Institution => &INSTITUTION,
            Self::Author => &AUTHOR,
        }
    }

    pub fn all() -> &'static [RecordType] {
        &[Self::Work, Self::Source, Self::Institution, Self::Author]
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_accepts_both_forms() {
        assert_eq!(RecordType::from_name("works"), Some(RecordType::Work));
        assert_eq!(RecordType::from_name("Work"), Some(RecordType::Work));
        assert_eq!(RecordType::from_name("SOURCES"), Some(RecordType::Source));
        assert_eq!(
            RecordType::from_name("institution"),
            Some(RecordType::Institution)
        );
        assert_eq!(RecordType::from_name("authors"), Some(RecordType::Author));
        assert_eq!(RecordType::from_name("topics"), None);
    }

    #[test]
    fn required_fields_are_whitelisted() {
        for rt in RecordType::all() {
            let cfg = rt.config();
            for req in cfg.required {
                assert!(cfg.fields.contains(req), "{rt}: {req} not projected");
            }
            assert!(cfg.fields.contains(&cfg.keyword_field), "{rt}");
        }
    }

    #[test]
    fn only_works_reconstruct_abstracts() {
        assert!(RecordType::Work.config().reconstruct_abstract);
        assert!(!RecordType::Source.config().reconstruct_abstract);
        assert!(!RecordType::Institution.config().reconstruct_abstract);
        assert!(!RecordType::Author.config().reconstruct_abstract);
    }

    #[test]
    fn whitelists_never_contain_raw_abstract() {
        for rt in RecordType::all() {
            assert!(!rt.config().fields.contains(&"abstract_inverted_index"));
            assert!(!rt.config().fields.contains(&"abstract"));
        }
    }

    #[test]
    fn display_is_index_name() {
        assert_eq!(RecordType::Work.to_string(), "work");
        assert_eq!(RecordType::Author.folder_name(), "authors");
    }
}
