//! Output formatting utilities for the CLI

use tt_server::probe::ProbeReport;

/// Format a handshake probe as human-readable lines
pub fn format_report(report: &ProbeReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Certificate: {}\n", report.fingerprint));

    match &report.assertion {
        Some(assertion) => {
            output.push_str(&format!("Generation: {}\n", assertion.generation));
            output.push_str(&format!("Target: {}\n", assertion.target));
            output.push_str(&format!(
                "Active: {}\n",
                if assertion.is_active() { "yes" } else { "no" }
            ));
            output.push_str(&format!(
                "Pinned: {}",
                if report.pinned { "yes" } else { "no (target mismatch)" }
            ));
        }
        None => output.push_str("No Tack Extension"),
    }

    output
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
