//! Data models for extracted rates.

mod rate;
mod result;

pub use rate::{Metal, RateFields, RateRecord, RateSource, SPOT_UNIT};
pub use result::{
    html_snippet, DebugInfo, ScrapeMetadata, ScrapeMethod, ScrapeResult, TableDump,
    HTML_SNIPPET_CHARS,
};
