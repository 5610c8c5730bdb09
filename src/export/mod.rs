use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Table,
    Json,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" | "workbook" | "sheet" => Some(Self::Csv),
            "table" | "report" | "text" | "txt" => Some(Self::Table),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Table => "txt",
            Self::Json => "json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<ExportFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".csv") {
        return Some(ExportFormat::Csv);
    }
    if lower.ends_with(".txt") || lower.ends_with(".text") {
        return Some(ExportFormat::Table);
    }
    if lower.ends_with(".json") {
        return Some(ExportFormat::Json);
    }
    None
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode csv row: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("failed to finish csv output: {message}")]
    CsvFinish { message: String },

    #[error("failed to encode json output: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Ordered field-to-column mapping. `headers` and `to_row` emit columns in
/// lockstep; values are snapshotted and formatted for reading at export time.
pub trait Exportable {
    fn headers() -> &'static [&'static str];
    fn to_row(&self) -> Vec<String>;
}

pub fn to_rows<T: Exportable>(records: &[&T]) -> Vec<Vec<String>> {
    records.iter().map(|r| r.to_row()).collect()
}

/// Renders the full view in the requested format. Callers hand in the
/// filtered/sorted view, never a page slice.
pub fn render<T: Exportable + Serialize>(
    records: &[&T],
    format: ExportFormat,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => render_csv(T::headers(), &to_rows(records)),
        ExportFormat::Table => Ok(render_table(T::headers(), &to_rows(records))),
        ExportFormat::Json => render_json(records),
    }
}

pub fn render_csv(headers: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.into_inner()
        .map_err(|e| ExportError::CsvFinish {
            message: e.to_string(),
        })
}

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<u8> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    push_row(&mut out, headers.iter().map(|h| h.to_string()), &widths);
    push_row(&mut out, widths.iter().map(|w| "-".repeat(*w)), &widths);
    for row in rows {
        push_row(&mut out, row.iter().cloned(), &widths);
    }
    out.into_bytes()
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let width = widths.get(i).copied().unwrap_or(0);
        line.push_str(&format!("{cell:<width$}"));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn render_json<T: Serialize>(records: &[&T]) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec_pretty(records)?)
}
