//! Queryable document capability shared by the static and rendered paths.
//!
//! Rate heuristics are written once against [`QueryableDocument`]. The static
//! implementation queries a parsed `scraper::Html`; the live implementation
//! answers the same queries from a snapshot the browser page computed in-page.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// How rows and cells are located for one table-detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowLayout {
    pub name: &'static str,
    /// Container selector; `None` scans rows anywhere in the document.
    pub container: Option<&'static str>,
    pub row: &'static str,
    pub cell: &'static str,
}

impl RowLayout {
    /// Key under which a snapshot stores this layout's rows.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.container.unwrap_or(""),
            self.row,
            self.cell
        )
    }

    /// Container layouts carry a header row that must be skipped.
    pub fn skips_header(&self) -> bool {
        self.container.is_some()
    }
}

/// Minimal query surface the extraction heuristics need.
pub trait QueryableDocument {
    /// Whitespace-normalized text of each element matching `selector`.
    fn texts(&self, selector: &str) -> Vec<String>;

    /// Values of attribute `name` on each element matching `selector`.
    fn attrs(&self, selector: &str, name: &str) -> Vec<String>;

    /// Rows of cell texts, header rows already skipped for container layouts.
    fn rows(&self, layout: &RowLayout) -> Vec<Vec<String>>;

    /// Number of elements matching `selector`.
    fn count(&self, selector: &str) -> usize {
        self.texts(selector).len()
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A parsed, server-delivered HTML document.
pub struct StaticDocument {
    html: Html,
}

impl StaticDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    fn element_text(element: &ElementRef<'_>) -> String {
        normalize_text(&element.text().collect::<String>())
    }

    fn row_cells(row: &ElementRef<'_>, cell: &Selector) -> Vec<String> {
        row.select(cell)
            .map(|c| Self::element_text(&c))
            .collect()
    }
}

impl QueryableDocument for StaticDocument {
    fn texts(&self, selector: &str) -> Vec<String> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.html
            .select(&selector)
            .map(|e| Self::element_text(&e))
            .collect()
    }

    fn attrs(&self, selector: &str, name: &str) -> Vec<String> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.html
            .select(&selector)
            .filter_map(|e| e.value().attr(name).map(str::to_string))
            .collect()
    }

    fn rows(&self, layout: &RowLayout) -> Vec<Vec<String>> {
        let (Ok(row_sel), Ok(cell_sel)) = (Selector::parse(layout.row), Selector::parse(layout.cell))
        else {
            return Vec::new();
        };

        match layout.container {
            Some(container) => {
                let Ok(container_sel) = Selector::parse(container) else {
                    return Vec::new();
                };
                let mut rows = Vec::new();
                for container in self.html.select(&container_sel) {
                    rows.extend(
                        container
                            .select(&row_sel)
                            .skip(1)
                            .map(|row| Self::row_cells(&row, &cell_sel)),
                    );
                }
                rows
            }
            None => self
                .html
                .select(&row_sel)
                .map(|row| Self::row_cells(&row, &cell_sel))
                .collect(),
        }
    }
}

/// Answers to queries computed inside a rendered page.
///
/// Built from the JSON an in-page script returns; queries the script was not
/// asked to answer come back empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    #[serde(default)]
    pub texts: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub attrs: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub rows: HashMap<String, Vec<Vec<String>>>,
    /// Element counts for selectors whose text is not needed.
    #[serde(default)]
    pub counts: HashMap<String, usize>,
}

impl LiveSnapshot {
    pub fn attr_key(selector: &str, name: &str) -> String {
        format!("{}@{}", selector, name)
    }
}

impl QueryableDocument for LiveSnapshot {
    fn texts(&self, selector: &str) -> Vec<String> {
        self.texts.get(selector).cloned().unwrap_or_default()
    }

    fn attrs(&self, selector: &str, name: &str) -> Vec<String> {
        self.attrs
            .get(&Self::attr_key(selector, name))
            .cloned()
            .unwrap_or_default()
    }

    fn rows(&self, layout: &RowLayout) -> Vec<Vec<String>> {
        self.rows.get(&layout.key()).cloned().unwrap_or_default()
    }

    fn count(&self, selector: &str) -> usize {
        self.counts
            .get(selector)
            .copied()
            .unwrap_or_else(|| self.texts(selector).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: RowLayout = RowLayout {
        name: "table",
        container: Some("table"),
        row: "tr",
        cell: "td, th",
    };

    const LOOSE_ROWS: RowLayout = RowLayout {
        name: "rows",
        container: None,
        row: "tr",
        cell: "td, th",
    };

    const HTML: &str = r#"
        <html><body>
          <table>
            <tr><th>Product</th><th>Bid</th></tr>
            <tr><td>Gold   Current</td><td>6,200</td></tr>
          </table>
          <script src="/static/js/main.abc123.js"></script>
        </body></html>
    "#;

    #[test]
    fn test_static_rows_skip_header_in_containers() {
        let doc = StaticDocument::parse(HTML);
        assert_eq!(
            doc.rows(&TABLE),
            vec![vec!["Gold Current".to_string(), "6,200".to_string()]]
        );
        assert_eq!(doc.rows(&LOOSE_ROWS).len(), 2);
    }

    #[test]
    fn test_static_attrs_and_counts() {
        let doc = StaticDocument::parse(HTML);
        assert_eq!(
            doc.attrs("script[src]", "src"),
            vec!["/static/js/main.abc123.js".to_string()]
        );
        assert_eq!(doc.count("table"), 1);
        assert!(doc.texts("[[invalid").is_empty());
    }

    #[test]
    fn test_live_snapshot_answers_known_queries() {
        let json = serde_json::json!({
            "texts": { "div": ["Gold rate 62000"] },
            "rows": { (TABLE.key()): [["Gold Current", "6200", "6300"]] },
            "counts": { "table": 2 }
        });
        let snapshot: LiveSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.texts("div"), vec!["Gold rate 62000".to_string()]);
        assert_eq!(snapshot.rows(&TABLE)[0][2], "6300");
        assert!(snapshot.texts("span").is_empty());
        assert!(snapshot.attrs("script", "src").is_empty());
        assert_eq!(snapshot.count("table"), 2);
        assert_eq!(snapshot.count("div"), 1);
    }
}
