//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Items that can be displayed as a table row
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

pub fn render_table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }
            println!("{}", render_table(items));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str, usize);

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["NAME", "TESTS"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    #[test]
    fn test_render_table_contains_rows() {
        let rendered = render_table(&[Row("resume-editor", 3), Row("templates", 1)]).to_string();
        assert!(rendered.contains("NAME"));
        assert!(rendered.contains("resume-editor"));
        assert!(rendered.contains("templates"));
    }
}
