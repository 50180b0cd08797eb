//! User agent selection for outbound requests.

pub const USER_AGENT: &str = concat!("liverates/", env!("CARGO_PKG_VERSION"));

/// Desktop browser user agents used when the config asks to impersonate.
///
/// Relays and rate sites often serve a stripped page (or a 403) to
/// non-browser agents.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:143.0) Gecko/20100101 Firefox/143.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.6 Safari/605.1.15",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Mobile Safari/537.36",
];

/// Pick one of [`IMPERSONATE_USER_AGENTS`], varying between process runs.
pub fn random_user_agent() -> &'static str {
    let seed = chrono::Utc::now().timestamp_subsec_nanos() as usize;
    IMPERSONATE_USER_AGENTS[seed % IMPERSONATE_USER_AGENTS.len()]
}

/// `None` is the crate agent, `"impersonate"` a browser agent, anything else
/// is used verbatim.
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("impersonate") => random_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}
