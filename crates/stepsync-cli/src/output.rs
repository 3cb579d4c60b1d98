//! Rendering of datasets and device results for the terminal.
//!
//! Every view has a text form (optionally colored) and a JSON form. Renderers
//! return strings so callers decide where they go.

use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use serde_json::json;
use stepsync_store::{Dataset, SeriesStats};
use time::{Date, Month};

const MONTHS_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Widest bar drawn in text charts.
const BAR_WIDTH: u64 = 40;

/// Text or JSON, with or without color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub json: bool,
    pub color: bool,
}

/// Group digits in thousands: `1234567` -> `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn bar(value: u64, max: u64) -> String {
    if max == 0 || value == 0 {
        return String::new();
    }
    let width = (value.saturating_mul(BAR_WIDTH) / max).max(1);
    "#".repeat(usize::try_from(width).unwrap_or(0))
}

fn heading(text: &str, style: Style) -> String {
    if style.color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

fn chart<L: AsRef<str>>(rows: &[(L, u64)], style: Style) -> String {
    let max = rows.iter().map(|(_, v)| *v).max().unwrap_or(0);
    let mut out = String::new();
    for (label, value) in rows {
        let bar = bar(*value, max);
        let bar = if style.color {
            bar.cyan().to_string()
        } else {
            bar
        };
        out.push_str(&format!("{:>4}  {:>9}  {bar}\n", label.as_ref(), thousands(*value)));
    }
    out
}

fn stats_line(stats: SeriesStats, unit: &str) -> String {
    format!(
        "Total: {} steps  |  {unit} Avg: {} steps",
        thousands(stats.total),
        thousands(stats.average)
    )
}

/// Overview printed after a load.
pub fn summary(dataset: &Dataset, style: Style) -> Result<String> {
    let summary = dataset.summary();
    if style.json {
        let value = json!({
            "source": dataset.source().map(Path::to_path_buf),
            "samples": summary.samples,
            "days": summary.days,
            "first_date": summary.first_date.map(|d| d.to_string()),
            "last_date": summary.last_date.map(|d| d.to_string()),
            "total_steps": summary.total_steps,
            "yearly": summary
                .yearly
                .iter()
                .map(|(year, steps)| json!({ "year": year, "steps": steps }))
                .collect::<Vec<_>>(),
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    if dataset.is_empty() {
        return Ok("No step data.\n".to_string());
    }

    let mut out = heading("Step data", style);
    out.push('\n');
    if let Some(source) = dataset.source() {
        out.push_str(&format!("  Source:  {}\n", source.display()));
    }
    out.push_str(&format!("  Samples: {}\n", thousands(summary.samples as u64)));
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        out.push_str(&format!("  Range:   {first} .. {last} ({} days with data)\n", summary.days));
    }
    out.push_str(&format!("  Total:   {} steps\n", thousands(summary.total_steps)));
    for (year, steps) in &summary.yearly {
        out.push_str(&format!("    {year}  {:>12}\n", thousands(*steps)));
    }
    Ok(out)
}

/// Hourly view of one day.
pub fn day(dataset: &Dataset, date: Date, style: Style) -> Result<String> {
    let hours = dataset.hourly_series(date);
    let total = dataset.steps_on(date);

    if style.json {
        let value = json!({
            "date": date.to_string(),
            "total": total,
            "hours": hours,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let rows: Vec<(String, u64)> = hours
        .iter()
        .enumerate()
        .map(|(hour, steps)| (format!("{hour:02}"), *steps))
        .collect();

    let mut out = heading(&format!("Hourly Steps for {date}"), style);
    out.push('\n');
    out.push_str(&chart(&rows, style));
    out.push_str(&format!("Total Steps: {}\n", thousands(total)));
    Ok(out)
}

/// Daily view of one month.
pub fn month(dataset: &Dataset, year: i32, month: Month, style: Style) -> Result<String> {
    let days = dataset.daily_series(year, month)?;
    let stats = dataset.month_stats(year, month)?;

    if style.json {
        let value = json!({
            "year": year,
            "month": u8::from(month),
            "total": stats.total,
            "average": stats.average,
            "days": days
                .iter()
                .map(|(date, steps)| json!({ "date": date.to_string(), "steps": steps }))
                .collect::<Vec<_>>(),
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let rows: Vec<(String, u64)> = days
        .iter()
        .map(|(date, steps)| (format!("{:02}", date.day()), *steps))
        .collect();

    let mut out = heading(&format!("Daily Steps for {month} {year}"), style);
    out.push('\n');
    out.push_str(&chart(&rows, style));
    out.push_str(&stats_line(stats, "Daily"));
    out.push('\n');
    Ok(out)
}

/// Monthly view of one year.
pub fn year(dataset: &Dataset, year: i32, style: Style) -> Result<String> {
    let months = dataset.monthly_series(year);
    let stats = dataset.year_stats(year);

    if style.json {
        let value = json!({
            "year": year,
            "total": stats.total,
            "average": stats.average,
            "months": months,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let rows: Vec<(&str, u64)> = MONTHS_ABBR.iter().copied().zip(months).collect();

    let mut out = heading(&format!("Monthly Steps for {year}"), style);
    out.push('\n');
    out.push_str(&chart(&rows, style));
    out.push_str(&stats_line(stats, "Monthly"));
    out.push('\n');
    Ok(out)
}

/// Device ids from a scan.
pub fn devices(ids: &[String], style: Style) -> Result<String> {
    if style.json {
        return Ok(serde_json::to_string_pretty(&json!({ "devices": ids }))?);
    }
    if ids.is_empty() {
        return Ok("No devices found.\n".to_string());
    }
    let mut out = heading(&format!("{} device(s) attached", ids.len()), style);
    out.push('\n');
    for id in ids {
        out.push_str(&format!("  {id}\n"));
    }
    Ok(out)
}

/// A status line, colored by kind.
pub fn status(text: &str, style: Style) -> String {
    if !style.color {
        return text.to_string();
    }
    if text.starts_with("Error") {
        text.red().to_string()
    } else if text.starts_with("Loaded") {
        text.green().to_string()
    } else {
        text.dimmed().to_string()
    }
}
