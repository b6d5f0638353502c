use chrono::{DateTime, Local};
use colored::*;

use crate::core::config::ProviderConfig;
use crate::core::sensors::{Availability, FetchOutcome, SensorEvent, SensorRecord, TargetSnapshot};

const NAME_WIDTH: usize = 48;

/// Format a sample value with its unit symbol, if any
pub fn format_value(record: &SensorRecord) -> String {
    let value = format_number(record.value);
    match record.unit {
        Some(unit) => format!("{} {}", value, unit.symbol()),
        None => value,
    }
}

/// Whole numbers without decimals, everything else with up to 3
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "+" } else { "-" };
        format!("{}Inf", sign)
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.3}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Format a unix timestamp in local time (YYYY-MM-DD HH:MM:SS)
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

pub fn format_outcome(outcome: &FetchOutcome) -> ColoredString {
    match outcome {
        FetchOutcome::Pending => "pending".dimmed(),
        FetchOutcome::Success { skipped: 0 } => "ok".green(),
        FetchOutcome::Success { skipped } => format!("ok ({} skipped)", skipped).yellow(),
        FetchOutcome::TransportError(e) => format!("transport error: {}", e).red(),
        FetchOutcome::ParseError(e) => format!("parse error: {}", e).red(),
    }
}

fn format_availability(availability: Availability) -> ColoredString {
    match availability {
        Availability::Available => "available".green(),
        Availability::Stale => "stale".yellow(),
        Availability::Unavailable => "unavailable".red(),
    }
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut out: String = name.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Print one target's snapshot as a table
pub fn print_snapshot(snapshot: &TargetSnapshot) {
    println!(
        "\n{} {}",
        snapshot.target.bold().bright_cyan(),
        format!("({})", snapshot.device.name).dimmed()
    );
    println!("{}", "=".repeat(80));
    println!(
        "  {:<12} {}   {:<12} {}",
        "Cycle:".bold(),
        snapshot.cycle,
        "Fetch:".bold(),
        format_outcome(&snapshot.outcome)
    );
    println!(
        "  {:<12} {}   {:<12} {}",
        "Sensors:".bold(),
        snapshot.len(),
        "Updated:".bold(),
        format_timestamp(snapshot.updated_at)
    );

    let diagnostics = &snapshot.diagnostics;
    if diagnostics.rejected > 0 || !diagnostics.collisions.is_empty() {
        println!(
            "  {:<12} {} rejected, {} identity collisions",
            "Filtered:".bold(),
            diagnostics.rejected,
            diagnostics.collisions.len()
        );
    }

    if snapshot.is_empty() {
        println!("  {}", "No sensors".dimmed());
        return;
    }

    println!("{}", "-".repeat(80));
    for record in snapshot.records.values() {
        let name = format!("{:<width$}", truncate(&record.name, NAME_WIDTH), width = NAME_WIDTH);
        let value = format!("{:<16}", format_value(record));
        if record.is_available() {
            println!("  {} {} {}", name, value.yellow(), format_availability(record.availability));
        } else {
            println!(
                "  {} {} {}",
                name.bright_black(),
                value.bright_black(),
                format_availability(record.availability)
            );
        }
    }
}

/// One line per change event
pub fn format_event(target: &str, event: &SensorEvent) -> String {
    let prefix = format!("[{}]", target).dimmed();
    match event {
        SensorEvent::Created(record) => format!(
            "{} {} {} = {}",
            prefix,
            "+".green().bold(),
            record.name,
            format_value(record).yellow()
        ),
        SensorEvent::Updated { record, changed: true } => format!(
            "{} {} {} = {}",
            prefix,
            "~".cyan().bold(),
            record.name,
            format_value(record).yellow()
        ),
        SensorEvent::Updated { record, changed: false } => {
            format!("{} {} {}", prefix, "=".dimmed(), record.name.dimmed())
        }
        SensorEvent::Stale(identity) => {
            format!("{} {} {} {}", prefix, "-".yellow().bold(), identity, "stale".yellow())
        }
        SensorEvent::Unavailable { reason, affected } => format!(
            "{} {} {} sensors unavailable: {}",
            prefix,
            "!".red().bold(),
            affected,
            reason.red()
        ),
    }
}

/// Print the validation result of every configured target
pub fn print_config_report(config: &ProviderConfig) {
    println!("\n{}", "CONFIGURATION".bold().bright_cyan());
    println!("{}", "=".repeat(80));
    println!("  {:<18} {}", "Prometheus URL:".bold(), config.prometheus_url);
    println!("  {:<18} {}s", "Scrape interval:".bold(), config.scrape_interval);
    println!("  {:<18} {}s", "Fetch timeout:".bold(), config.fetch_timeout);
    println!("{}", "-".repeat(80));

    for target in &config.targets {
        println!(
            "  {} {} {} every {}s",
            "✓".green(),
            target.target_name.bold(),
            format!("({}=\"{}\", job=\"{}\")", target.instance_label, target.instance_value, target.job_name)
                .dimmed(),
            config.interval_for(target).as_secs()
        );
    }
    for error in &config.errors {
        println!("  {} {}", "✗".red(), error);
    }

    println!(
        "\n  {} valid, {} invalid",
        config.targets.len().to_string().green(),
        config.errors.len().to_string().red()
    );
}
