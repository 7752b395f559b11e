//! Terminal rendering of lookup records.
//!
//! Colored status lines go to stdout through `console`; JSON mode prints one
//! object per line instead.

use console::style;
use domscan_lib::LookupRecord;
use std::time::Duration;

const FRAME_WIDTH: usize = 80;

/// Running counts for the end-of-run summary.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tally {
    pub available: usize,
    pub unavailable: usize,
    pub errors: usize,
}

impl Tally {
    pub fn record(&mut self, record: &LookupRecord) {
        match record.availability() {
            Some(true) => self.available += 1,
            Some(false) => self.unavailable += 1,
            None => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.unavailable + self.errors
    }
}

/// Elapsed time as ` (1.234)` seconds, empty unless benchmarking.
pub fn format_elapsed(elapsed: Duration, benchmark: bool) -> String {
    if benchmark {
        // Whole milliseconds, truncated
        format!(" ({:.3})", elapsed.as_millis() as f64 / 1000.0)
    } else {
        String::new()
    }
}

/// Plain status line for a record, without colors.
pub fn format_status(record: &LookupRecord, benchmark: bool) -> String {
    let elapsed = format_elapsed(record.elapsed, benchmark);
    match &record.error {
        Some(error) => format!("❗ {}: error ({}){}", record.name, error, elapsed),
        None if record.available => format!("✔ {}: available{}", record.name, elapsed),
        None => format!("✘ {}: unavailable{}", record.name, elapsed),
    }
}

/// Print one record as a colored status line, optionally followed by the raw response.
pub fn print_record(record: &LookupRecord, benchmark: bool, show_whois: bool) {
    let line = format_status(record, benchmark);
    let styled = match (&record.error, record.available) {
        (Some(_), _) => style(line).red(),
        (None, true) => style(line).green(),
        (None, false) => style(line).yellow(),
    };
    println!("{}", styled);

    if show_whois && record.error.is_none() {
        let frame = "=".repeat(FRAME_WIDTH);
        println!("{}", frame);
        println!("{}", record.response.trim_end());
        println!("{}", frame);
    }
}

/// Print one record as a single JSON line.
///
/// The raw response is only included when `show_whois` is set.
pub fn print_json_record(record: &LookupRecord, show_whois: bool) -> Result<(), serde_json::Error> {
    let mut value = serde_json::to_value(record)?;
    if !show_whois {
        if let Some(object) = value.as_object_mut() {
            object.remove("response");
        }
    }
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}

/// Print the multi-domain summary.
pub fn print_summary(tally: &Tally, duration: Duration) {
    println!();
    println!(
        "{} domain{} in {:.1}s  {}  {}  {}  {}  {}",
        style(tally.total()).bold(),
        if tally.total() == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", tally.available)).green(),
        style("|").dim(),
        style(format!("{} unavailable", tally.unavailable)).yellow(),
        style(format!("| {} errors", tally.errors)).red(),
    );
}

/// Print the total running time, shown with `--benchmark`.
pub fn print_running_time(duration: Duration) {
    println!("Running time: {:.3}s", duration.as_secs_f64());
}
