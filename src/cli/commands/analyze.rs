//! Static page analysis command.

use console::style;

use crate::config::Settings;
use crate::orchestrator::RateOrchestrator;

/// Fetch `url`, classify it and list where rates might come from.
pub async fn cmd_analyze(settings: &Settings, url: &str, json: bool) -> anyhow::Result<()> {
    let orchestrator = RateOrchestrator::from_settings(settings)?;
    let analysis = orchestrator.analyze(url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("\n{}", style(format!("Analysis of {}", analysis.url)).bold());
    println!("  Fetched via {} ({} bytes)", analysis.relay, analysis.html_length);

    let spa = if analysis.structure.is_react_spa {
        style("yes").yellow()
    } else {
        style("no").green()
    };
    println!("  Client-rendered: {}", spa);
    if let Some(root) = &analysis.structure.root_element_selector {
        println!("  App root: {}", root);
    }
    println!(
        "  Candidates: {} tables, {} scripts, {} rate-like containers",
        analysis.census.tables, analysis.census.scripts, analysis.census.rate_containers
    );
    println!("  Rates in static HTML: {}", analysis.static_rates.len());

    if !analysis.structure.possible_apis.is_empty() {
        println!("\n{}", style("Referenced APIs:").cyan());
        for api in &analysis.structure.possible_apis {
            println!("  {}", api);
        }
    }

    println!("\n{}", style("Endpoints to probe:").cyan());
    for endpoint in &analysis.endpoints {
        println!("  {} {}", endpoint.method, endpoint.url);
    }

    if !analysis.websockets.is_empty() {
        println!("\n{}", style("WebSocket feeds (not followed):").cyan());
        for ws in &analysis.websockets {
            println!("  {}", ws);
        }
    }
    Ok(())
}
