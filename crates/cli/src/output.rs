//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KI: u64 = 1024;
    const MI: u64 = KI * 1024;
    const GI: u64 = MI * 1024;

    if bytes >= GI {
        format!("{:.2}Gi", bytes as f64 / GI as f64)
    } else if bytes >= MI {
        format!("{:.0}Mi", bytes as f64 / MI as f64)
    } else if bytes >= KI {
        format!("{:.0}Ki", bytes as f64 / KI as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 {
        format!("{:.2}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format currency
pub fn format_currency(amount: f64, currency: &str) -> String {
    match currency {
        "USD" => format!("${:.2}", amount),
        "EUR" => format!("€{:.2}", amount),
        "GBP" => format!("£{:.2}", amount),
        _ => format!("{:.2} {}", amount, currency),
    }
}

/// Color an efficiency score: green when well used, red when mostly idle
pub fn color_efficiency(score: u8) -> String {
    let formatted = format!("{}%", score);
    if score >= 70 {
        formatted.green().to_string()
    } else if score >= 40 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a recommendation source or container status
pub fn color_source(source: &str) -> String {
    match source {
        "autoscaler" => source.green().to_string(),
        "partial_autoscaler" | "usage_fallback" => source.yellow().to_string(),
        "current_request" | "request_only" => source.blue().to_string(),
        "floor_default" => source.red().to_string(),
        _ => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(64 * 1024), "64Ki");
        assert_eq!(format_bytes(512 * 1024 * 1024), "512Mi");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.50Gi");
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(250), "250m");
        assert_eq!(format_cpu(1500), "1.50");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(14.43, "USD"), "$14.43");
        assert_eq!(format_currency(2.5, "CHF"), "2.50 CHF");
    }

    #[test]
    fn test_colored_values_keep_text() {
        assert!(color_efficiency(85).contains("85%"));
        assert!(color_source("floor_default").contains("floor_default"));
    }
}
