//! XLSX output for pgxport.
//!
//! Renders a `TabularResult` into a single-sheet workbook using
//! rust_xlsxwriter.

mod writer;

pub use writer::{estimate_width_len, write_workbook, SheetReport, SheetWriter};

/// Excel worksheet maximum row count.
pub const N_ROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_COLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const SHEET_NAME_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];

/// Checks a sheet name against Excel's naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    let n_chars = name.chars().count();
    if n_chars > N_LEN_SHEET_NAME_MAX {
        return Err(format!(
            "must be at most {N_LEN_SHEET_NAME_MAX} characters, got {n_chars}"
        ));
    }
    if let Some(c) = name.chars().find(|c| SHEET_NAME_ILLEGAL.contains(c)) {
        return Err(format!("must not contain '{c}'"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err("must not start or end with an apostrophe".to_string());
    }
    Ok(())
}
