//! Console message helpers
//!
//! Status lines printed by command handlers share one set of markers so
//! `run`, `show` and `db status` read alike.

use colored::Colorize;

/// Turn colors off for the rest of the process (`--no-color`).
pub fn disable_color() {
    colored::control::set_override(false);
}

pub fn success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

pub fn failure(message: &str) -> String {
    format!("{} {}", "✗".red().bold(), message)
}

pub fn info(message: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), message)
}

pub fn warning(message: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), message)
}

/// Section title with a dim rule underneath.
pub fn section(title: &str) -> String {
    format!(
        "\n{} {}\n{}",
        "📊".cyan().bold(),
        title.bold(),
        "━".repeat(60).bright_black()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_prefix_messages() {
        disable_color();
        assert_eq!(success("done"), "✓ done");
        assert_eq!(failure("sec_filings failed"), "✗ sec_filings failed");
        assert_eq!(info("nothing stored"), "ℹ nothing stored");
        assert_eq!(warning("stale"), "⚠ stale");
        assert!(section("Filings").contains("Filings"));
    }
}
