//! Timeline rendering: aligned text table or pretty JSON.

use std::fmt::Write as _;

use anyhow::Result;
use chainhistory_core::{HistoryEvent, Timeline};

const HEADERS: [&str; 6] = ["BLOCK", "TIME (UTC)", "KIND", "AMOUNT", "COUNTERPARTY", "TX"];

pub fn render_json(timeline: &Timeline) -> Result<String> {
    Ok(serde_json::to_string_pretty(timeline)?)
}

pub fn render_table(timeline: &Timeline) -> String {
    if timeline.is_empty() {
        return format!("{}: no events\n", timeline.subject);
    }

    let rows: Vec<[String; 6]> = timeline.iter().map(row).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = format!("{} ({} events)\n", timeline.subject, timeline.len());
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }
    out
}

fn row(event: &HistoryEvent) -> [String; 6] {
    [
        event.block_number.to_string(),
        event
            .time()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| event.timestamp.to_string()),
        event.kind.to_string(),
        event
            .amount
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".into()),
        event
            .counterparty
            .map(|a| format!("{a:#x}"))
            .unwrap_or_else(|| "-".into()),
        format!("{:#x}", event.tx_hash),
    ]
}

fn push_line(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let mut line = String::new();
    for (cell, &width) in cells.iter().zip(widths) {
        let _ = write!(line, "{cell:<width$}  ");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
