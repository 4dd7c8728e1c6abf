//! Output formatting utilities for CLI commands

use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use fieldlog_db::{FileStatus, MessageClass};

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

/// Print a table with custom column colors
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = new_table(headers);
    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(c) => Cell::new(text).fg(c),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }
    println!("{}", table);
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

pub fn status_color(status: FileStatus) -> Color {
    match status {
        FileStatus::Processing => Color::Yellow,
        FileStatus::Processed => Color::Green,
        FileStatus::Error => Color::Red,
    }
}

pub fn class_color(class: &MessageClass) -> Option<Color> {
    match class {
        MessageClass::Alarm => Some(Color::Red),
        MessageClass::Warning => Some(Color::Yellow),
        MessageClass::Other(_) => Some(Color::DarkGrey),
        _ => None,
    }
}

/// Format a UTC timestamp in local time, or "-" when absent
pub fn format_timestamp(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// Shorten text for a table cell
pub fn ellipsize(text: &str, max: usize) -> String {
    fieldlog::truncate_text(text, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_absent() {
        assert_eq!(format_timestamp(None), "-");
    }

    #[test]
    fn test_status_colors_differ() {
        assert_ne!(
            status_color(FileStatus::Processed),
            status_color(FileStatus::Error)
        );
    }
}
