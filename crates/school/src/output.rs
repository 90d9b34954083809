//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use school_core::Notification;

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Unread marker, bold when color is on.
pub fn unread_marker(read: bool, color: bool) -> String {
    match (read, color) {
        (true, _) => String::new(),
        (false, true) => "●".bold().yellow().to_string(),
        (false, false) => "*".into(),
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
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// the `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
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

// ── Notification rows ────────────────────────────────────────────────

#[derive(Tabled)]
pub struct NotificationRow {
    #[tabled(rename = "")]
    pub unread: String,
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Message")]
    pub message: String,
    #[tabled(rename = "Time")]
    pub time: String,
}

impl NotificationRow {
    pub fn new(notification: &Notification, color: bool) -> Self {
        Self {
            unread: unread_marker(notification.read, color),
            id: notification.id.to_string(),
            category: notification.category.to_string(),
            message: notification.message.clone(),
            time: notification.timestamp.clone().unwrap_or_default(),
        }
    }
}

/// One line per notification, for the live watch feed.
pub fn notification_line(notification: &Notification, color: bool) -> String {
    let marker = unread_marker(notification.read, color);
    let time = notification.timestamp.as_deref().unwrap_or("-");
    if color {
        format!(
            "{marker:1} {} [{}] {}  {}",
            notification.id.dimmed(),
            notification.category.cyan(),
            notification.message,
            time.dimmed()
        )
    } else {
        format!(
            "{marker:1} {} [{}] {}  {time}",
            notification.id, notification.category, notification.message
        )
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub(crate) fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("<serialization failed: {e}>"))
}

/// Compact single-line JSON.
pub(crate) fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| format!("<serialization failed: {e}>"))
}

/// YAML output.
pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("<serialization failed: {e}>"))
}
