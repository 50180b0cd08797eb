//! Network-facing extraction tiers: relayed fetching, API probing and
//! browser rendering.

pub mod browser;
mod http_client;
pub mod probe;
pub mod relay;

pub use browser::{
    BrowserEngineConfig, BrowserRenderScraper, PageStructure, RenderOutcome, RenderScraper,
};
pub use http_client::{
    random_user_agent, resolve_user_agent, HttpClient, HttpResponse, HttpTransport, USER_AGENT,
};
pub use probe::{ApiDiscovery, ApiEndpoint, ApiEndpointProbe, ProbeResult, ResponseType};
pub use relay::{ProxyFetcher, RawFetch, RelayAttempt, RelayConfig, RelayFormat};
