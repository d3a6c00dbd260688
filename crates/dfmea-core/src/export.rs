use std::io::Write;

use crate::FmeaRow;

pub const CSV_HEADER: &str = "Product Category,Product,Subsystem,Component,Function,Failure Mode,Effect,Severity,Occurrence,Detection";
pub const CSV_FILE_NAME: &str = "dfmea_export.csv";

/// Export columns in header order. Values are written verbatim, without quoting.
pub fn csv_fields(row: &FmeaRow) -> [String; 10] {
    [
        row.product_category.clone(),
        row.product.clone(),
        row.subsystem.clone(),
        row.component.clone(),
        row.function.clone(),
        row.failure_mode.clone(),
        row.effect.clone(),
        row.severity.to_string(),
        row.occurrence.to_string(),
        row.detection.to_string(),
    ]
}

/// Header line, a newline, then one line per row joined by `\n` with no trailing newline.
pub fn export_csv(rows: &[FmeaRow]) -> String {
    let body = rows
        .iter()
        .map(|row| csv_fields(row).join(","))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + body.len());
    out.push_str(CSV_HEADER);
    out.push('\n');
    out.push_str(&body);
    out
}

pub fn write_csv(rows: &[FmeaRow], out: &mut dyn Write) -> std::io::Result<()> {
    out.write_all(export_csv(rows).as_bytes())
}
