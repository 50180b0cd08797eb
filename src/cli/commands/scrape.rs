//! Scrape and structure commands.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::{RateRecord, ScrapeResult};
use crate::orchestrator::RateOrchestrator;

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn fmt_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_rate(rate: &RateRecord) {
    let f = &rate.fields;
    let values = if f.m_rate.is_some() || f.premium.is_some() || f.sell.is_some() {
        format!(
            "m-rate {}  premium {}  sell {}",
            fmt_value(f.m_rate),
            fmt_value(f.premium),
            fmt_value(f.sell)
        )
    } else {
        format!(
            "bid {}  ask {}  high {}  low {}",
            fmt_value(f.bid),
            fmt_value(f.ask),
            fmt_value(f.high),
            fmt_value(f.low)
        )
    };
    println!(
        "  {:<7} {:<18} {}  {}",
        style(rate.metal.as_str()).bold(),
        rate.category,
        values,
        style(format!("[{} / {}]", rate.source.as_str(), rate.unit)).dim()
    );
}

fn print_result(result: &ScrapeResult) {
    let meta = &result.metadata;
    if result.success {
        println!(
            "{} {} rates from {} via {} ({}ms)",
            style("✓").green(),
            result.rates.len(),
            meta.url,
            style(meta.method).cyan(),
            meta.processing_time_ms
        );
    } else {
        println!(
            "{} No rates from {} (last tier: {})",
            style("✗").red(),
            meta.url,
            meta.method
        );
    }

    for rate in &result.rates {
        print_rate(rate);
    }
    for warning in &meta.warnings {
        println!("  {} {}", style("!").yellow(), warning);
    }
    for error in &meta.errors {
        println!("  {} {}", style("✗").red(), error);
    }

    if let Some(debug) = &result.debug {
        println!(
            "  {} {} bytes of HTML, {} endpoints probed, {} table layouts{}",
            style("→").dim(),
            debug.html_length,
            debug.api_endpoints.len(),
            debug.table_structure.len(),
            if debug.screenshot.is_some() { ", screenshot captured" } else { "" }
        );
    }
}

/// Scrape `url` once and print the result.
pub async fn cmd_scrape(
    settings: &Settings,
    url: &str,
    fresh: bool,
    debug: bool,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = RateOrchestrator::from_settings(settings)?;

    let pb = (!json).then(|| spinner(format!("Scraping {}...", url)));
    let result = if fresh {
        orchestrator.scrape(url, debug).await
    } else {
        orchestrator.scrape_with_cache(url, debug).await
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    orchestrator.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

/// Render `url` and print its DOM summary as JSON.
pub async fn cmd_structure(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let orchestrator = RateOrchestrator::from_settings(settings)?;

    let pb = spinner(format!("Rendering {}...", url));
    let structure = orchestrator.structure(url).await;
    pb.finish_and_clear();
    orchestrator.close().await;

    let structure = structure?;
    eprintln!(
        "{} {} tables, {} scripts, {} rate-like elements",
        style("→").cyan(),
        structure.tables,
        structure.scripts,
        structure.rate_elements
    );
    println!("{}", serde_json::to_string_pretty(&structure)?);
    Ok(())
}
