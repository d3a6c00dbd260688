use std::io::Write;

use anyhow::{Context, Result};
use dfmea_core::FmeaRow;
use dfmea_gateway::{FileReceipt, IndexedFile, format_size};
use dfmea_session::Notification;

pub fn write_json_to_stdout(value: &serde_json::Value) -> Result<()> {
    let mut out = std::io::stdout();
    serde_json::to_writer_pretty(&mut out, value).context("failed to serialize JSON output")?;
    writeln!(&mut out).context("failed to write trailing newline")?;
    Ok(())
}

pub fn write_text_to_stdout(text: &str) -> Result<()> {
    let mut out = std::io::stdout();
    out.write_all(text.as_bytes())
        .context("failed to write output")?;
    Ok(())
}

/// Left-aligned columns separated by two spaces, header underlined with dashes.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, headers.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_line(&mut out, rule.iter().map(String::as_str), &widths);
    for row in rows {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn rows_table(rows: &[FmeaRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            vec![
                index.to_string(),
                row.component.clone(),
                row.function.clone(),
                row.failure_mode.clone(),
                row.effect.clone(),
                row.severity.to_string(),
                row.occurrence.to_string(),
                row.detection.to_string(),
                row.rpn().to_string(),
                row.feedback
                    .map(|feedback| feedback.as_str().to_owned())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    render_table(
        &[
            "#",
            "Component",
            "Function",
            "Failure Mode",
            "Effect",
            "S",
            "O",
            "D",
            "RPN",
            "Feedback",
        ],
        &body,
    )
}

pub fn indexed_files_table(files: &[IndexedFile]) -> String {
    let body: Vec<Vec<String>> = files
        .iter()
        .map(|file| {
            vec![
                file.name.clone(),
                file.category.label().to_owned(),
                file.display_size(),
                file.status.as_str().to_owned(),
                file.date.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();
    render_table(&["Name", "Category", "Size", "Status", "Date"], &body)
}

pub fn receipts_table(files: &[FileReceipt]) -> String {
    let body: Vec<Vec<String>> = files
        .iter()
        .map(|file| {
            vec![
                file.file_name.clone(),
                file.category.label().to_owned(),
                format_size(file.size_bytes),
                file.status.as_str().to_owned(),
            ]
        })
        .collect();
    render_table(&["File", "Category", "Size", "Status"], &body)
}

pub fn notification_lines(notifications: &[Notification]) -> String {
    let mut out = String::new();
    for notification in notifications {
        out.push_str(&notification.message);
        out.push('\n');
        if let Some(sub_message) = &notification.sub_message {
            out.push_str("  ");
            out.push_str(sub_message);
            out.push('\n');
        }
    }
    out
}
