//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let addr = normalize_bind_address(bind);

    println!("{} Starting liverates server at http://{}", style("→").cyan(), addr);
    match &settings.target_url {
        Some(url) => println!("  {} Default target: {}", style("→").dim(), url),
        None => println!("  {} No default target; pass ?url=", style("!").yellow()),
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &addr).await
}

/// Accept a bare port ("3030" -> 127.0.0.1:3030), a bare host
/// ("0.0.0.0" -> 0.0.0.0:3030) or host:port.
fn normalize_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("127.0.0.1:{}", port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() {
            return format!("{}:{}", host, port_str);
        }
    }

    format!("{}:3030", bind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bind_address() {
        assert_eq!(normalize_bind_address("8080"), "127.0.0.1:8080");
        assert_eq!(normalize_bind_address("0.0.0.0"), "0.0.0.0:3030");
        assert_eq!(normalize_bind_address("0.0.0.0:9000"), "0.0.0.0:9000");
    }
}
