//! Output formatting for CLI results

use serde::Serialize;
use std::io::{self, Write};

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
    /// Hex dump of payloads
    Hex,
}

/// Render a received body
pub fn format_payload(data: &[u8], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => String::from_utf8_lossy(data).into_owned(),
        OutputFormat::Hex => hex::encode(data),
        OutputFormat::Json => serde_json::json!({
            "size": data.len(),
            "hex": hex::encode(data),
            "text": String::from_utf8_lossy(data),
        })
        .to_string(),
    }
}

/// Render a structured value; `text` is used for the human form
pub fn format_value<T: Serialize>(value: &T, text: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value)
                .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
        }
        OutputFormat::Text | OutputFormat::Hex => text.to_string(),
    }
}

/// Write `data` to stdout in `format`
pub fn print_payload(data: &[u8], format: OutputFormat) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match format {
        OutputFormat::Text => stdout.write_all(data)?,
        _ => writeln!(stdout, "{}", format_payload(data, format))?,
    }
    stdout.flush()
}
