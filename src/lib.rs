//! liverates - live bullion rate extraction.
//!
//! Obtains gold and silver rates from a site with no public API by trying
//! progressively more expensive tiers: static HTML through CORS relays,
//! guessed API endpoints, a delayed SPA re-fetch, and finally a headless
//! browser render.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod scrapers;
pub mod server;

pub use cache::RateCache;
pub use error::{Result, ScrapeError};
pub use models::{RateRecord, ScrapeMethod, ScrapeResult};
pub use orchestrator::RateOrchestrator;
