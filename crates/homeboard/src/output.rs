//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use homeboard_core::{Notice, NoticeLevel};

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single item. Table mode uses `detail_fn`'s pre-formatted text.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// One-line status for a notice, on stderr.
pub fn print_notice(notice: &Notice, color: &ColorMode, quiet: bool) {
    if quiet && notice.level == NoticeLevel::Success {
        return;
    }
    let line = format!("{}: {}", notice.title, notice.message);
    match (notice.level, should_color(color)) {
        (NoticeLevel::Success, true) => eprintln!("{} {line}", "✓".green()),
        (NoticeLevel::Error, true) => eprintln!("{} {line}", "✗".red()),
        (NoticeLevel::Success, false) => eprintln!("ok {line}"),
        (NoticeLevel::Error, false) => eprintln!("error {line}"),
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let out = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    out.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

/// `-` for missing values in table cells.
pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Item {
        id: u32,
        name: &'static str,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { id: 1, name: "Lamp" }, Item { id: 2, name: "Door" }]
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let out = render_list(
            &OutputFormat::Plain,
            &items(),
            |i| ItemRow { name: i.name.into() },
            |i| i.id.to_string(),
        );
        assert_eq!(out, "1\n2");
    }

    #[test]
    fn table_uses_row_headers() {
        let out = render_list(
            &OutputFormat::Table,
            &items(),
            |i| ItemRow { name: i.name.into() },
            |i| i.id.to_string(),
        );
        assert!(out.contains("Name"));
        assert!(out.contains("Lamp"));
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_json(&items(), true);
        assert_eq!(out, r#"[{"id":1,"name":"Lamp"},{"id":2,"name":"Door"}]"#);
    }
}
