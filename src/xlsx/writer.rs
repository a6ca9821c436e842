//! Workbook writer that renders one `TabularResult` into one sheet.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook, Worksheet, XlsxError};
use tracing::{debug, warn};

use super::{validate_sheet_name, N_COLS_EXCEL_MAX, N_ROWS_EXCEL_MAX};
use crate::db::{TabularResult, Value};
use crate::error::{ExportError, Result};

/// Narrowest column width after autofit, in character units.
const WIDTH_CELL_MIN: usize = 8;
/// Widest column width after autofit.
const WIDTH_CELL_MAX: usize = 60;
/// Padding added to the widest value.
const WIDTH_CELL_PADDING: usize = 2;

/// Light grey fill behind header cells.
const HEADER_FILL: u32 = 0xD9D9D9;

const NUM_FORMAT_DATE: &str = "yyyy-mm-dd";
const NUM_FORMAT_DATETIME: &str = "yyyy-mm-dd hh:mm:ss";

/// What was written, for the success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReport {
    pub file: PathBuf,
    pub sheet: String,
    pub rows: usize,
    pub columns: usize,
}

/// Single-sheet workbook writer.
///
/// The workbook is built in memory; [`Self::close`] serializes it and moves
/// it into place. Dropping the writer without closing leaves the destination
/// untouched.
pub struct SheetWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    fmt_header: Format,
    fmt_date: Format,
    fmt_datetime: Format,
    report: Option<SheetReport>,
    if_closed: bool,
}

impl SheetWriter {
    /// Create writer bound to output path.
    pub fn new(path_file_out: impl Into<PathBuf>) -> Self {
        Self {
            path_file_out: path_file_out.into(),
            workbook: Workbook::new(),
            fmt_header: Format::new()
                .set_bold()
                .set_pattern(FormatPattern::Solid)
                .set_background_color(Color::RGB(HEADER_FILL)),
            fmt_date: Format::new().set_num_format(NUM_FORMAT_DATE),
            fmt_datetime: Format::new().set_num_format(NUM_FORMAT_DATETIME),
            report: None,
            if_closed: false,
        }
    }

    /// Write the header row and every data row into a new sheet.
    pub fn write_sheet(&mut self, table: &TabularResult, sheet_name: &str) -> Result<()> {
        if self.if_closed {
            return Err(ExportError::write("Cannot write after close()."));
        }
        if self.report.is_some() {
            return Err(ExportError::write("Workbook already holds a sheet."));
        }
        validate_sheet_name(sheet_name)
            .map_err(|e| ExportError::write(format!("Sheet name '{sheet_name}' {e}")))?;
        validate_table_size(table)?;

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(sheet_name).map_err(derive_xlsx_error)?;

        write_header(worksheet, table.columns(), &self.fmt_header)?;
        worksheet.set_freeze_panes(1, 0).map_err(derive_xlsx_error)?;

        for (n_idx_row, row) in table.rows().iter().enumerate() {
            let n_row = cast_row_num(n_idx_row + 1)?;
            for (n_idx_col, value) in row.iter().enumerate() {
                let n_col = cast_col_num(n_idx_col)?;
                write_value(
                    worksheet,
                    n_row,
                    n_col,
                    value,
                    &self.fmt_date,
                    &self.fmt_datetime,
                )
                .map_err(derive_xlsx_error)?;
            }
        }

        for (n_idx_col, n_width) in plan_column_widths(table).into_iter().enumerate() {
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, n_width as f64)
                .map_err(derive_xlsx_error)?;
        }

        debug!(
            "Rendered sheet '{sheet_name}' with {} rows x {} columns",
            table.row_count(),
            table.column_count()
        );

        self.report = Some(SheetReport {
            file: self.path_file_out.clone(),
            sheet: sheet_name.to_string(),
            rows: table.row_count(),
            columns: table.column_count(),
        });
        Ok(())
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<SheetReport> {
        let report = self
            .report
            .clone()
            .ok_or_else(|| ExportError::write("No sheet was written."))?;
        if self.if_closed {
            return Ok(report);
        }

        let buffer = self.workbook.save_to_buffer().map_err(derive_xlsx_error)?;
        persist_atomically(&self.path_file_out, &buffer)?;
        self.if_closed = true;
        Ok(report)
    }
}

/// Write `table` to `path` as a workbook with one sheet named `sheet_name`.
pub fn write_workbook(
    table: &TabularResult,
    path: &Path,
    sheet_name: &str,
) -> Result<SheetReport> {
    let mut writer = SheetWriter::new(path);
    writer.write_sheet(table, sheet_name)?;
    writer.close()
}

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Timestamp(ts) if ts.time() == NaiveTime::MIN => NUM_FORMAT_DATE.len(),
        Value::Timestamp(_) => NUM_FORMAT_DATETIME.len(),
        other => estimate_unicode_string_width(&other.to_display_string()),
    }
}

fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Final width per column: widest header or value, padded and clamped.
fn plan_column_widths(table: &TabularResult) -> Vec<usize> {
    let mut l_width_by_col: Vec<usize> = table
        .columns()
        .iter()
        .map(|name| estimate_unicode_string_width(name))
        .collect();

    for row in table.rows() {
        for (n_idx_col, value) in row.iter().enumerate() {
            l_width_by_col[n_idx_col] =
                usize::max(l_width_by_col[n_idx_col], estimate_width_len(value));
        }
    }

    l_width_by_col
        .into_iter()
        .map(|n| (n + WIDTH_CELL_PADDING).clamp(WIDTH_CELL_MIN, WIDTH_CELL_MAX))
        .collect()
}

fn validate_table_size(table: &TabularResult) -> Result<()> {
    if table.row_count() + 1 > N_ROWS_EXCEL_MAX {
        return Err(ExportError::write(format!(
            "{} rows exceed the sheet limit of {} data rows",
            table.row_count(),
            N_ROWS_EXCEL_MAX - 1
        )));
    }
    if table.column_count() > N_COLS_EXCEL_MAX {
        return Err(ExportError::write(format!(
            "{} columns exceed the sheet limit of {N_COLS_EXCEL_MAX}",
            table.column_count()
        )));
    }
    Ok(())
}

fn write_header(worksheet: &mut Worksheet, columns: &[String], fmt_header: &Format) -> Result<()> {
    for (n_idx_col, name) in columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, cast_col_num(n_idx_col)?, name, fmt_header)
            .map_err(derive_xlsx_error)?;
    }
    Ok(())
}

fn write_value(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    value: &Value,
    fmt_date: &Format,
    fmt_datetime: &Format,
) -> std::result::Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Number(n) if n.is_finite() => {
            worksheet.write_number(n_row, n_col, *n)?;
        }
        // Excel has no NaN or infinity.
        Value::Number(n) => {
            worksheet.write_string(n_row, n_col, n.to_string())?;
        }
        Value::Bool(b) => {
            worksheet.write_boolean(n_row, n_col, *b)?;
        }
        Value::Text(s) => {
            worksheet.write_string(n_row, n_col, s)?;
        }
        Value::Timestamp(ts) => {
            let format = if ts.time() == NaiveTime::MIN {
                fmt_date
            } else {
                fmt_datetime
            };
            worksheet.write_datetime_with_format(n_row, n_col, ts, format)?;
        }
    }
    Ok(())
}

/// Writes `bytes` next to `path` and renames over it, so a failed write
/// never leaves a truncated workbook behind.
fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ExportError::write(format!("Invalid output path: {}", path.display())))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let path_tmp = path.with_file_name(tmp_name);

    if let Err(e) = std::fs::write(&path_tmp, bytes) {
        remove_partial(&path_tmp);
        return Err(
            ExportError::write(format!("Cannot write {}: {e}", path.display())).with_source(e),
        );
    }

    if let Err(e) = std::fs::rename(&path_tmp, path) {
        remove_partial(&path_tmp);
        return Err(
            ExportError::write(format!("Cannot replace {}: {e}", path.display())).with_source(e),
        );
    }
    Ok(())
}

fn remove_partial(path_tmp: &Path) {
    match std::fs::remove_file(path_tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {e}", path_tmp.display()),
    }
}

fn cast_row_num(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| ExportError::write(format!("Row index {n} out of range")))
}

fn cast_col_num(n: usize) -> Result<u16> {
    u16::try_from(n).map_err(|_| ExportError::write(format!("Column index {n} out of range")))
}

fn derive_xlsx_error(err: XlsxError) -> ExportError {
    ExportError::write(err.to_string()).with_source(err)
}
