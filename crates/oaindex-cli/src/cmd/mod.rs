pub mod ingest;
pub mod schema;
pub mod search;

use clap::ValueEnum;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use oaindex_ingest::RecordType;

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum TypeArg {
    #[value(alias = "works")]
    Work,
    #[value(alias = "sources")]
    Source,
    #[value(alias = "institutions")]
    Institution,
    #[value(alias = "authors")]
    Author,
}

impl From<TypeArg> for RecordType {
    fn from(t: TypeArg) -> Self {
        match t {
            TypeArg::Work => RecordType::Work,
            TypeArg::Source => RecordType::Source,
            TypeArg::Institution => RecordType::Institution,
            TypeArg::Author => RecordType::Author,
        }
    }
}

/// Selected types, or every type when none were given
pub fn record_types(types: &[TypeArg]) -> Vec<RecordType> {
    if types.is_empty() {
        RecordType::all().to_vec()
    } else {
        let mut out: Vec<RecordType> = Vec::with_capacity(types.len());
        for t in types {
            let rt = RecordType::from(*t);
            if !out.contains(&rt) {
                out.push(rt);
            }
        }
        out
    }
}

/// Table with the house style and a cyan header row
pub fn styled_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = styled_table(&[title, "Value"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
