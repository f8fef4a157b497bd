//! Formatting utilities for CLI output.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

const BOLD_RED: &str = "\x1b[1m\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Formats error messages with styling
pub fn format_error(text: &str) -> String {
    format!("{BOLD_RED}{text}{RESET}")
}

/// Render `value` as JSON indented by `indent` spaces, or on one line when `indent` is zero
///
/// # Errors
/// Returns error if the value cannot be represented as JSON
pub fn to_json<T: Serialize>(value: &T, indent: usize) -> Result<String, serde_json::Error> {
    if indent == 0 {
        return serde_json::to_string(value);
    }

    let indent = vec![b' '; indent];
    let mut buffer = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut serializer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
