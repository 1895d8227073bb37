//! Plain-text rendering for the terminal.
//!
//! Everything here returns a `String` so the command loop decides where it
//! goes and tests can check the layout.

use telstrasms_core::models::{CredentialEntry, MessageRow};
use telstrasms_core::utils::truncate_string;
use telstrasms_core::{Notice, Severity};

/// Column headers for the message table
const HEADERS: [&str; 3] = ["Sender", "Time", "Message"];

/// Longest message text shown in a table cell
const MAX_TEXT_WIDTH: usize = 60;

/// Gap between table columns
const COLUMN_GAP: &str = "  ";

/// Render received messages as a table sized to its contents
pub fn message_table(rows: &[MessageRow]) -> String {
    if rows.is_empty() {
        return "No messages received yet.".to_string();
    }

    let cells: Vec<[String; 3]> = rows
        .iter()
        .map(|r| {
            [
                r.sender.clone(),
                r.time.clone(),
                truncate_string(&r.text.replace(['\n', '\r'], " "), MAX_TEXT_WIDTH),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&format_row(&HEADERS.map(String::from), &widths));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join(COLUMN_GAP));
    for row in &cells {
        out.push('\n');
        out.push_str(&format_row(row, &widths));
    }
    out
}

fn format_row(cells: &[String; 3], widths: &[usize; 3]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    padded.join(COLUMN_GAP).trim_end().to_string()
}

/// Render the stored keys as a numbered choice list
pub fn key_choices(entries: &[CredentialEntry]) -> String {
    if entries.is_empty() {
        return "No stored keys. Enter a new key pair with `key <key> <secret>` or `key new`."
            .to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| entry.choice_label(i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a notice for the status line
pub fn notice(notice: &Notice) -> String {
    match notice.severity {
        Severity::Info => notice.to_string(),
        Severity::Warning => format!("Warning: {}", notice),
        Severity::Error => format!("Error: {}", notice),
    }
}

pub fn number_label(number: Option<&str>) -> String {
    match number {
        Some(number) => format!("Num: {}", number),
        None => "Num: N/A (request token)".to_string(),
    }
}
