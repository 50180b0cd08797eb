//! HTTP request handlers for the web server.

mod api;
mod helpers;
mod rates;

pub use api::{cache_status, health};
pub use helpers::{ErrorEnvelope, RatesAction};
pub use rates::{get_rates, post_rates};
