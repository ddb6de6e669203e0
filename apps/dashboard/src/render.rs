use std::fmt::Write as _;

use client_core::DataSnapshot;
use shared::domain::{CollectionView, Column, Row};

const PIXELS_PER_CHAR: u16 = 10;
const MIN_COLUMN_CHARS: usize = 6;

fn column_chars(column: &Column) -> usize {
    let from_width = column
        .width
        .map(|px| usize::from(px / PIXELS_PER_CHAR))
        .unwrap_or(MIN_COLUMN_CHARS);
    from_width
        .max(MIN_COLUMN_CHARS)
        .max(column.header_name.chars().count())
}

fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        return format!("{text:<width$}");
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

pub fn render_table(columns: &[Column], rows: &[Row]) -> String {
    let widths: Vec<usize> = columns.iter().map(column_chars).collect();
    let mut out = String::new();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| fit(&column.header_name, *width))
        .collect();
    let _ = writeln!(out, "{}", header.join(" | ").trim_end());
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));

    if rows.is_empty() {
        let _ = writeln!(out, "(no rows)");
    }
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(column, width)| fit(&row.cell_text(&column.field), *width))
            .collect();
        let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
    }
    out
}

/// Whether `next` changes anything on screen. Editing the search text alone
/// waits for the fetch it triggers.
pub fn needs_redraw(previous: Option<&DataSnapshot>, next: &DataSnapshot) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let unchanged = DataSnapshot {
        search_query: next.search_query.clone(),
        ..previous.clone()
    };
    unchanged != *next
}

/// Full view of a collection: title, search, table, pager and error state.
pub fn render_snapshot(snapshot: &DataSnapshot) -> String {
    let view = snapshot
        .endpoint
        .as_deref()
        .and_then(CollectionView::from_endpoint);
    let mut out = String::new();

    if let Some(view) = view {
        let _ = writeln!(out, "== {} ==", view.title());
    }
    if !snapshot.search_query.is_empty() {
        let _ = writeln!(out, "search: {}", snapshot.search_query);
    }
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "Error: {error}");
        let _ = writeln!(out, "Type 'retry' to try again.");
        return out;
    }

    let columns = view.map(CollectionView::columns).unwrap_or_default();
    out.push_str(&render_table(&columns, &snapshot.data));

    let pagination = &snapshot.pagination;
    let mut pager = pagination.label();
    if pagination.can_go_previous() {
        pager.push_str("  [prev]");
    }
    if pagination.can_go_next() {
        pager.push_str("  [next]");
    }
    let _ = writeln!(out, "{pager}");
    out
}
