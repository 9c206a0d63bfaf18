//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn render_table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

fn render_fields<T: TableDisplay>(item: &T) -> String {
    T::headers()
        .iter()
        .zip(item.row())
        .map(|(header, value)| format!("{}: {}\n", header, value))
        .collect()
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", render_table(std::slice::from_ref(item))),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item).unwrap_or_default()),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(item).unwrap_or_default()),
        OutputFormat::Plain => print!("{}", render_fields(item)),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => println!("{}", render_table(items)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items).unwrap_or_default()),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(items).unwrap_or_default()),
        OutputFormat::Plain => {
            let blocks: Vec<String> = items.iter().map(render_fields).collect();
            print!("{}", blocks.join("---\n"));
        }
    }
}

/// Format unix seconds as a UTC timestamp
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str, u32);

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Count"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    #[test]
    fn test_render_fields() {
        assert_eq!(render_fields(&Row("home", 3)), "Name: home\nCount: 3\n");
    }

    #[test]
    fn test_render_table_has_every_row() {
        let rendered = render_table(&[Row("home", 3), Row("cart", 12)]).to_string();
        for text in ["Name", "Count", "home", "cart", "12"] {
            assert!(rendered.contains(text), "missing {}", text);
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20");
    }
}
