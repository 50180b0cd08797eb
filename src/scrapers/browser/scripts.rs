//! In-page scripts evaluated against the rendered DOM.
//!
//! The snapshot script answers exactly the queries the extraction heuristics
//! make, using the same selector constants, so a
//! [`LiveSnapshot`](crate::extract::LiveSnapshot) behaves
//! like a static document of the rendered page.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::extract::structure::RATE_CONTAINER_SELECTOR;
use crate::extract::text::{SCRIPT_SELECTOR, TEXT_SCAN_SELECTOR};
use crate::extract::TABLE_LAYOUTS;

/// Awaited after the stabilization delay unless configured otherwise.
pub const RATE_WAIT_SELECTOR: &str = r#"table, [class*="rate"], [class*="price"]"#;

/// Deepest level `getStructure` reports.
const STRUCTURE_MAX_DEPTH: usize = 6;

/// Script returning a `LiveSnapshot`-shaped object.
pub fn snapshot_script() -> String {
    let layouts: Vec<_> = TABLE_LAYOUTS
        .iter()
        .map(|l| json!({ "key": l.key(), "container": l.container, "row": l.row, "cell": l.cell }))
        .collect();
    let queries = json!({
        "texts": [TEXT_SCAN_SELECTOR, SCRIPT_SELECTOR],
        "counts": ["table", "script", RATE_CONTAINER_SELECTOR],
        "attrs": [["script[src]", "src"]],
        "layouts": layouts,
    });

    format!(
        r#"(() => {{
    const q = {queries};
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
    const all = (root, sel) => {{
        try {{ return Array.from(root.querySelectorAll(sel)); }} catch (e) {{ return []; }}
    }};
    const out = {{ texts: {{}}, attrs: {{}}, rows: {{}}, counts: {{}} }};
    for (const sel of q.texts) out.texts[sel] = all(document, sel).map((e) => norm(e.textContent));
    for (const sel of q.counts) out.counts[sel] = all(document, sel).length;
    for (const [sel, name] of q.attrs) {{
        out.attrs[sel + '@' + name] = all(document, sel)
            .map((e) => e.getAttribute(name))
            .filter((v) => v !== null);
    }}
    for (const l of q.layouts) {{
        const cells = (row) => all(row, l.cell).map((c) => norm(c.textContent));
        out.rows[l.key] = l.container
            ? all(document, l.container).flatMap((c) => all(c, l.row).slice(1).map(cells))
            : all(document, l.row).map(cells);
    }}
    return out;
}})()"#
    )
}

/// One element of the rendered DOM summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    pub child_count: usize,
    /// Own text, truncated.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

/// Depth-limited summary of a rendered page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStructure {
    pub url: String,
    pub title: String,
    pub tables: usize,
    pub scripts: usize,
    pub rate_elements: usize,
    pub root: Option<DomNode>,
}

/// Script returning a [`PageStructure`]-shaped object.
pub fn structure_script() -> String {
    let rate_selector = serde_json::to_string(RATE_CONTAINER_SELECTOR).unwrap_or_default();
    format!(
        r#"(() => {{
    const walk = (el, depth) => {{
        const own = Array.from(el.childNodes)
            .filter((n) => n.nodeType === Node.TEXT_NODE)
            .map((n) => n.textContent.trim())
            .join(' ')
            .slice(0, 80);
        return {{
            tag: el.tagName.toLowerCase(),
            id: el.id || null,
            classes: Array.from(el.classList),
            childCount: el.children.length,
            text: own || null,
            children: depth < {STRUCTURE_MAX_DEPTH} ? Array.from(el.children).map((c) => walk(c, depth + 1)) : [],
        }};
    }};
    return {{
        url: location.href,
        title: document.title,
        tables: document.querySelectorAll('table').length,
        scripts: document.querySelectorAll('script').length,
        rateElements: document.querySelectorAll({rate_selector}).length,
        root: document.body ? walk(document.body, 0) : null,
    }};
}})()"#
    )
}
