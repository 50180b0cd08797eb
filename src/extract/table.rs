//! Table-driven rate extraction.
//!
//! Three row classifiers (gold auction, market, spot) run over every
//! table-like structure. Each classifier walks [`TABLE_LAYOUTS`] in priority
//! order and stops at the first layout that yields a record, so one table is
//! never counted twice under different selector interpretations.
//!
//! Column guessing is expressed as ordered lists of pure `Row -> Option<_>`
//! tiers; the first tier returning `Some` wins.

use std::sync::LazyLock;

use regex::Regex;

use super::document::{QueryableDocument, RowLayout};
use super::numeric::plausible_number;
use crate::models::{Metal, RateFields, RateRecord, RateSource, TableDump, SPOT_UNIT};

/// Table-detection strategies in priority order.
pub const TABLE_LAYOUTS: &[RowLayout] = &[
    RowLayout {
        name: "table",
        container: Some("table"),
        row: "tr",
        cell: "td, th",
    },
    RowLayout {
        name: "class-matched",
        container: Some(
            r#"div[class*="table"], div[class*="rate"], div[class*="price"], ul[class*="rate"]"#,
        ),
        row: r#"[class*="row"], li"#,
        cell: r#"[class*="cell"], [class*="col"], span"#,
    },
    RowLayout {
        name: "direct-rows",
        container: None,
        row: r#"tr, [role="row"]"#,
        cell: r#"td, th, [role="cell"], [role="gridcell"]"#,
    },
];

static PURITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:99\.\d+|999|995|916|24\s?k|22\s?k|18\s?k|\d{2}\s?kt?)\b").unwrap()
});

type Row = [String];

/// `[mRate, premium, sell]`.
type Triple = (f64, f64, f64);

type TripleTier = fn(&Row) -> Option<Triple>;
type QuoteTier = fn(&Row) -> Option<RateFields>;

/// Gold-auction column tiers, tried in order.
const AUCTION_TIERS: &[TripleTier] = &[auction_fixed_order, auction_alternate_order, auction_by_magnitude];

/// Market-row tiers: column-count driven, then positional fallback.
const MARKET_TIERS: &[QuoteTier] = &[market_by_column_count, market_positional];

fn cell(row: &Row, idx: usize) -> Option<f64> {
    row.get(idx).and_then(|c| plausible_number(c))
}

/// Premium is an add-on smaller than the market rate; sell is never below it.
fn consistent(triple: Triple) -> Option<Triple> {
    let (m_rate, premium, sell) = triple;
    (premium < m_rate && m_rate <= sell).then_some(triple)
}

fn auction_fixed_order(row: &Row) -> Option<Triple> {
    consistent((cell(row, 1)?, cell(row, 2)?, cell(row, 3)?))
}

fn auction_alternate_order(row: &Row) -> Option<Triple> {
    consistent((cell(row, 2)?, cell(row, 1)?, cell(row, 3)?))
}

/// Largest is sell, next is the market rate, smallest is premium.
fn auction_by_magnitude(row: &Row) -> Option<Triple> {
    let mut values: Vec<f64> = row.iter().skip(1).filter_map(|c| plausible_number(c)).collect();
    if values.len() < 3 {
        return None;
    }
    values.sort_by(|a, b| b.total_cmp(a));
    Some((values[1], values[values.len() - 1], values[0]))
}

fn market_by_column_count(row: &Row) -> Option<RateFields> {
    match row.len() {
        n if n >= 5 => Some(RateFields {
            bid: Some(cell(row, 1)?),
            ask: Some(cell(row, 2)?),
            high: cell(row, 3),
            low: cell(row, 4),
            ..Default::default()
        }),
        4 => {
            let (bid, ask, third) = (cell(row, 1)?, cell(row, 2)?, cell(row, 3)?);
            Some(RateFields {
                bid: Some(bid),
                ask: Some(ask),
                high: Some(third),
                low: Some(bid.min(ask).min(third)),
                ..Default::default()
            })
        }
        3 => {
            let (a, b) = (cell(row, 1)?, cell(row, 2)?);
            Some(RateFields {
                bid: Some(a.min(b)),
                ask: Some(a.max(b)),
                ..Default::default()
            })
        }
        _ => None,
    }
}

fn market_positional(row: &Row) -> Option<RateFields> {
    let values: Vec<f64> = row.iter().skip(1).filter_map(|c| plausible_number(c)).collect();
    if values.len() < 2 {
        return None;
    }
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    Some(RateFields {
        bid: Some(values[0]),
        ask: Some(values[1]),
        high: Some(values.get(2).copied().unwrap_or(max)),
        low: Some(values.get(3).copied().unwrap_or(min)),
        ..Default::default()
    })
}

fn label(row: &Row) -> String {
    row.first().map(|c| c.to_lowercase()).unwrap_or_default()
}

/// First cell names gold and either auction, a purity marker, or GST.
pub fn is_gold_auction_row(row: &Row) -> bool {
    let label = label(row);
    row.len() >= 4
        && label.contains("gold")
        && (label.contains("auction") || label.contains("99.50") || label.contains("gst"))
}

/// First cell names a metal, is not auction/spot, and the row carries a
/// purity marker or digits.
pub fn is_market_row(row: &Row) -> bool {
    let label = label(row);
    let names_metal = label.contains("gold") || label.contains("silver");
    let excluded = label.contains("auction") || label.contains("spot") || is_gold_auction_row(row);
    let has_figures = PURITY.is_match(&label)
        || row.iter().skip(1).any(|c| c.chars().any(|ch| ch.is_ascii_digit()));
    names_metal && !excluded && has_figures
}

pub fn is_spot_row(row: &Row) -> bool {
    label(row).contains("spot")
}

/// Resolve an auction row through the column tiers.
pub fn resolve_auction_row(row: &Row) -> Option<Triple> {
    AUCTION_TIERS.iter().find_map(|tier| tier(row))
}

/// Resolve a market row through the column tiers.
pub fn resolve_market_row(row: &Row) -> Option<RateFields> {
    MARKET_TIERS.iter().find_map(|tier| tier(row))
}

/// Spot rows need bid and ask; high and low are optional.
pub fn resolve_spot_row(row: &Row) -> Option<RateFields> {
    Some(RateFields {
        bid: Some(cell(row, 1)?),
        ask: Some(cell(row, 2)?),
        high: cell(row, 3),
        low: cell(row, 4),
        ..Default::default()
    })
}

/// Row classifiers over a queryable document.
pub struct TableRateParser {
    source: RateSource,
}

impl TableRateParser {
    /// Parser tagging records with `source` (static table or live browser table).
    pub fn new(source: RateSource) -> Self {
        Self { source }
    }

    /// Run all three classifiers, auction rows first.
    pub fn parse_all(&self, doc: &impl QueryableDocument) -> Vec<RateRecord> {
        let mut records = self.parse_gold_auction_rows(doc);
        records.extend(self.parse_market_rows(doc));
        records.extend(self.parse_spot_rows(doc));
        records
    }

    pub fn parse_gold_auction_rows(&self, doc: &impl QueryableDocument) -> Vec<RateRecord> {
        self.first_productive_layout(doc, |row| {
            if !is_gold_auction_row(row) {
                return None;
            }
            let (m_rate, premium, sell) = resolve_auction_row(row)?;
            let fields = RateFields {
                m_rate: Some(m_rate),
                premium: Some(premium),
                sell: Some(sell),
                ..Default::default()
            };
            RateRecord::new(Metal::Gold, "gold_auction", &row[0], fields, self.source)
        })
    }

    pub fn parse_market_rows(&self, doc: &impl QueryableDocument) -> Vec<RateRecord> {
        self.first_productive_layout(doc, |row| {
            if !is_market_row(row) {
                return None;
            }
            let metal = Metal::detect(&row[0])?;
            let fields = resolve_market_row(row)?;
            RateRecord::new(metal, format!("{}_market", metal), &row[0], fields, self.source)
        })
    }

    pub fn parse_spot_rows(&self, doc: &impl QueryableDocument) -> Vec<RateRecord> {
        self.first_productive_layout(doc, |row| {
            if !is_spot_row(row) {
                return None;
            }
            let metal = Metal::detect(&row[0])?;
            let fields = resolve_spot_row(row)?;
            RateRecord::new(metal, format!("{}_spot", metal), &row[0], fields, self.source)
                .map(|r| r.with_unit(SPOT_UNIT))
        })
    }

    fn first_productive_layout<F>(&self, doc: &impl QueryableDocument, classify: F) -> Vec<RateRecord>
    where
        F: Fn(&Row) -> Option<RateRecord>,
    {
        for layout in TABLE_LAYOUTS {
            let records: Vec<RateRecord> = doc
                .rows(layout)
                .iter()
                .filter_map(|row| classify(row))
                .collect();
            if !records.is_empty() {
                tracing::debug!("{} record(s) from {} layout", records.len(), layout.name);
                return records;
            }
        }
        Vec::new()
    }

    /// Row counts and a sample of each layout, for debug output.
    pub fn dump_structure(doc: &impl QueryableDocument) -> Vec<TableDump> {
        TABLE_LAYOUTS
            .iter()
            .map(|layout| {
                let rows = doc.rows(layout);
                TableDump {
                    strategy: layout.name.to_string(),
                    rows: rows.len(),
                    sample: rows.into_iter().take(5).collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::document::StaticDocument;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_auction_row_fixed_order() {
        let r = row(&["Gold 99.50 GST 3", "6250", "150", "6400"]);
        assert!(is_gold_auction_row(&r));
        assert_eq!(resolve_auction_row(&r), Some((6250.0, 150.0, 6400.0)));
    }

    #[test]
    fn test_auction_row_reordered_resolves_same_triple() {
        let r = row(&["Gold 99.50 Auction", "6400", "6250", "150"]);
        assert!(is_gold_auction_row(&r));
        assert_eq!(resolve_auction_row(&r), Some((6250.0, 150.0, 6400.0)));
    }

    #[test]
    fn test_auction_row_alternate_order() {
        let r = row(&["Gold Auction", "150", "6250", "6400"]);
        assert_eq!(auction_fixed_order(&r), None);
        assert_eq!(auction_alternate_order(&r), Some((6250.0, 150.0, 6400.0)));
    }

    #[test]
    fn test_auction_row_requires_markers() {
        assert!(!is_gold_auction_row(&row(&["Gold 22K", "1", "2", "3"])));
        assert!(!is_gold_auction_row(&row(&["Silver Auction", "1", "2", "3"])));
        assert!(!is_gold_auction_row(&row(&["Gold Auction", "6250", "6400"])));
    }

    #[test]
    fn test_auction_row_unresolvable_is_skipped() {
        let r = row(&["Gold Auction", "6250", "-", "n/a"]);
        assert_eq!(resolve_auction_row(&r), None);
    }

    #[test]
    fn test_market_three_cells_min_max() {
        let r = row(&["Gold Current", "6300", "6200"]);
        assert!(is_market_row(&r));
        let fields = resolve_market_row(&r).unwrap();
        assert_eq!(fields.bid, Some(6200.0));
        assert_eq!(fields.ask, Some(6300.0));

        let r = row(&["Gold Current", "6200", "6300"]);
        let fields = resolve_market_row(&r).unwrap();
        assert_eq!(fields.bid, Some(6200.0));
        assert_eq!(fields.ask, Some(6300.0));
    }

    #[test]
    fn test_market_four_cells_derives_high_low() {
        let r = row(&["Silver 999", "74000", "74500", "75000"]);
        let fields = resolve_market_row(&r).unwrap();
        assert_eq!(fields.high, Some(75000.0));
        assert_eq!(fields.low, Some(74000.0));
    }

    #[test]
    fn test_market_five_cells() {
        let r = row(&["Gold 995", "62000", "62100", "62500", "61800"]);
        let fields = resolve_market_row(&r).unwrap();
        assert_eq!(
            (fields.bid, fields.ask, fields.high, fields.low),
            (Some(62000.0), Some(62100.0), Some(62500.0), Some(61800.0))
        );
    }

    #[test]
    fn test_market_positional_fallback() {
        // Structured extraction fails on the placeholder in the bid column.
        let r = row(&["Gold 916", "-", "5800", "5900", "5750"]);
        let fields = resolve_market_row(&r).unwrap();
        assert_eq!(fields.bid, Some(5800.0));
        assert_eq!(fields.ask, Some(5900.0));
        assert_eq!(fields.high, Some(5750.0));
        assert_eq!(fields.low, Some(5750.0));
    }

    #[test]
    fn test_market_excludes_auction_and_spot() {
        assert!(!is_market_row(&row(&["Gold Auction", "6250", "150", "6400"])));
        assert!(!is_market_row(&row(&["Gold Spot", "2400", "2401"])));
        assert!(!is_market_row(&row(&["Gold 99.50 GST 3", "6250", "150", "6400"])));
        assert!(!is_market_row(&row(&["Gold", "-", "-"])));
    }

    #[test]
    fn test_spot_requires_bid_and_ask() {
        let r = row(&["Gold Spot ($)", "2401.5", "2402.1"]);
        let fields = resolve_spot_row(&r).unwrap();
        assert_eq!(fields.bid, Some(2401.5));
        assert_eq!(fields.high, None);
        assert!(resolve_spot_row(&row(&["Gold Spot", "2401.5"])).is_none());
    }

    #[test]
    fn test_parse_document_end_to_end() {
        let html = r#"<table>
            <tr><th>Product</th><th>M-Rate</th><th>Premium</th><th>Sell</th></tr>
            <tr><td>Gold 99.50 GST 3</td><td>6,250</td><td>150</td><td>6,400</td></tr>
            <tr><td>Gold Current</td><td>6200</td><td>6300</td></tr>
            <tr><td>Silver Spot</td><td>2,410</td><td>2,412</td></tr>
            <tr><td>Page 2 of 10</td><td>2</td><td>10</td><td>1</td></tr>
        </table>"#;
        let doc = StaticDocument::parse(html);
        let records = TableRateParser::new(RateSource::Table).parse_all(&doc);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].category, "gold_auction");
        assert_eq!(records[0].fields.m_rate, Some(6250.0));
        assert_eq!(records[0].fields.premium, Some(150.0));
        assert_eq!(records[0].fields.sell, Some(6400.0));
        assert_eq!(records[1].category, "gold_market");
        assert_eq!(records[1].fields.bid, Some(6200.0));
        assert_eq!(records[2].category, "silver_spot");
        assert_eq!(records[2].unit, SPOT_UNIT);
        assert_eq!(records[1].unit, "per 10 grams");
        assert_eq!(records[2].source, RateSource::Table);
    }

    #[test]
    fn test_first_productive_layout_wins() {
        // Rows visible to both the table layout and the direct-row layout
        // must only be counted once.
        let html = r#"<table>
            <tr><th>Product</th><th>Bid</th><th>Ask</th></tr>
            <tr><td>Gold Current</td><td>6200</td><td>6300</td></tr>
        </table>"#;
        let doc = StaticDocument::parse(html);
        let records = TableRateParser::new(RateSource::Table).parse_market_rows(&doc);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_class_matched_layout() {
        let html = r#"<div class="rate-table">
            <div class="row"><span>Product</span><span>Bid</span><span>Ask</span></div>
            <div class="row"><span>Silver 999</span><span>74,000</span><span>74,500</span></div>
        </div>"#;
        let doc = StaticDocument::parse(html);
        let records = TableRateParser::new(RateSource::Table).parse_market_rows(&doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metal, Metal::Silver);
        assert_eq!(records[0].fields.ask, Some(74500.0));
    }

    #[test]
    fn test_every_field_is_plausible() {
        let html = r#"<table>
            <tr><th>x</th></tr>
            <tr><td>Gold 995</td><td>62000</td><td>62100</td><td>99</td><td>700000</td></tr>
        </table>"#;
        let doc = StaticDocument::parse(html);
        for record in TableRateParser::new(RateSource::Table).parse_all(&doc) {
            for v in [record.fields.bid, record.fields.ask, record.fields.high, record.fields.low]
                .into_iter()
                .flatten()
            {
                assert!(v > 100.0 && v < 500_000.0);
            }
        }
    }
}
