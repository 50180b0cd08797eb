//! Rate extraction heuristics.
//!
//! Everything here is synchronous and free of I/O. A parsed
//! [`StaticDocument`] is not `Send`, so callers parse, extract and drop it
//! without holding it across an await point.

pub mod document;
pub mod numeric;
pub mod structure;
pub mod table;
pub mod text;

use std::collections::HashSet;

pub use document::{LiveSnapshot, QueryableDocument, RowLayout, StaticDocument};
pub use numeric::{
    extract_currency_values, extract_numbers, is_plausible, parse_number, CurrencyValue,
};
pub use structure::{CandidateCensus, HtmlStructureAnalyzer, StructureReport};
pub use table::{TableRateParser, TABLE_LAYOUTS};

use crate::models::{RateRecord, RateSource, TableDump};

/// Record sources for one extraction context.
#[derive(Debug, Clone, Copy)]
pub struct SourceTags {
    pub table: RateSource,
    pub text: RateSource,
    pub script: RateSource,
}

impl SourceTags {
    pub const STATIC: Self = Self {
        table: RateSource::Table,
        text: RateSource::Div,
        script: RateSource::Script,
    };

    pub const BROWSER: Self = Self {
        table: RateSource::BrowserTable,
        text: RateSource::BrowserText,
        script: RateSource::BrowserJson,
    };
}

/// Everything a single extraction pass produced.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub rates: Vec<RateRecord>,
    pub census: CandidateCensus,
    pub table_structure: Vec<TableDump>,
}

/// Append one strategy's output to `into`, dropping records that repeat a
/// (metal, value) pair already present.
///
/// Records within `incoming` are never compared with each other, so two
/// products quoted at the same bid both survive.
pub fn merge_records(into: &mut Vec<RateRecord>, incoming: impl IntoIterator<Item = RateRecord>) {
    let seen: HashSet<_> = into.iter().map(RateRecord::dedup_key).collect();
    into.extend(incoming.into_iter().filter(|r| !seen.contains(&r.dedup_key())));
}

/// Table scan, then free-text scan, then embedded-JSON scan, merged.
pub fn extract_rates(doc: &impl QueryableDocument, tags: SourceTags) -> Extraction {
    let mut rates = TableRateParser::new(tags.table).parse_all(doc);
    merge_records(&mut rates, text::scan_text_nodes(doc, tags.text));
    merge_records(&mut rates, text::scan_scripts(doc, tags.script));

    Extraction {
        rates,
        census: HtmlStructureAnalyzer::census(doc),
        table_structure: TableRateParser::dump_structure(doc),
    }
}

/// Parse and extract static HTML in one synchronous step.
pub fn extract_static(html: &str) -> Extraction {
    let doc = StaticDocument::parse(html);
    extract_rates(&doc, SourceTags::STATIC)
}
