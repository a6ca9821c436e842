//! Shared helpers for integration tests.

use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use pgxport::db::{TabularResult, Value};
use std::path::{Path, PathBuf};

/// Connection settings written into test configs.
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "testdb".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        }
    }
}

/// Writes a complete config.toml into `dir` and returns its path.
pub fn write_config(dir: &Path, db: &DbSettings, sql: &str, output: &Path, sheet: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let content = format!(
        r#"[db]
host = '{}'
port = {}
name = '{}'
user = '{}'
password = '{}'

[query]
sql = '''{}'''

[output]
file = '{}'
sheet = '{}'
"#,
        db.host,
        db.port,
        db.name,
        db.user,
        db.password,
        sql,
        output.display(),
        sheet
    );
    std::fs::write(&path, content).unwrap();
    path
}

/// Writes a config.properties into `dir` and returns its path.
pub fn write_properties_config(
    dir: &Path,
    db: &DbSettings,
    sql: &str,
    output: &Path,
    sheet: &str,
) -> PathBuf {
    let path = dir.join("config.properties");
    let content = format!(
        "# Database Configuration\n\
         db.host={}\n\
         db.port={}\n\
         db.name={}\n\
         db.user={}\n\
         db.password={}\n\
         \n\
         query.sql={}\n\
         \n\
         output.file={}\n\
         output.sheet={}\n",
        db.host,
        db.port,
        db.name,
        db.user,
        db.password,
        sql,
        output.display(),
        sheet
    );
    std::fs::write(&path, content).unwrap();
    path
}

/// Opens a workbook and returns its sheet names and the cells of `sheet`.
pub fn read_sheet(path: &Path, sheet: &str) -> (Vec<String>, Vec<Vec<Data>>) {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let names = workbook.sheet_names();
    let range = workbook.worksheet_range(sheet).unwrap();
    let rows = range.rows().map(|row| row.to_vec()).collect();
    (names, rows)
}

/// Checks that a cell read back from a workbook holds `value`.
pub fn cell_matches(cell: &Data, value: &Value) -> bool {
    match value {
        Value::Null => matches!(cell, Data::Empty),
        Value::Number(n) => cell.as_f64() == Some(*n),
        Value::Bool(b) => matches!(cell, Data::Bool(v) if v == b),
        Value::Text(s) => matches!(cell, Data::String(v) if v == s),
        Value::Timestamp(ts) => cell.as_datetime() == Some(*ts),
    }
}

/// Asserts that `rows` (header first) reproduce `table` exactly.
pub fn assert_sheet_matches(rows: &[Vec<Data>], table: &TabularResult) {
    assert_eq!(rows.len(), table.row_count() + 1, "header + data rows");

    let header: Vec<String> = rows[0].iter().map(|c| c.to_string()).collect();
    assert_eq!(header, table.columns());

    for (idx, (cells, values)) in rows[1..].iter().zip(table.rows()).enumerate() {
        assert_eq!(cells.len(), table.column_count(), "width of row {idx}");
        for (col, (cell, value)) in cells.iter().zip(values).enumerate() {
            assert!(
                cell_matches(cell, value),
                "row {idx} column {col}: expected {value:?}, found {cell:?}"
            );
        }
    }
}
