use std::path::{Path, PathBuf};

use miette::Diagnostic;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use thiserror::Error;

use catalint_report::Status;

use crate::list::ValidationRows;

const CATALOG_HEADERS: &[(&str, f64)] = &[
    ("catalog_title", 40.0),
    ("catalog_status", 15.0),
    ("catalog_error_message", 60.0),
    ("catalog_error_location", 40.0),
];

const DATASET_HEADERS: &[(&str, f64)] = &[
    ("dataset_title", 40.0),
    ("dataset_identifier", 20.0),
    ("dataset_list_index", 12.0),
    ("dataset_status", 15.0),
    ("dataset_error_message", 60.0),
    ("dataset_error_location", 25.0),
];

#[derive(Debug, Error, Diagnostic)]
pub enum TableError {
    #[error("cannot export to {}: expected a .csv or .xlsx path", path.display())]
    #[diagnostic(
        code(catalint::export::extension),
        help("use a path ending in .csv or .xlsx")
    )]
    UnsupportedExtension { path: PathBuf },

    #[error("failed to write CSV {}: {source}", path.display())]
    #[diagnostic(code(catalint::export::csv))]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write CSV {}: {source}", path.display())]
    #[diagnostic(code(catalint::export::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workbook {}: {source}", path.display())]
    #[diagnostic(code(catalint::export::xlsx))]
    Xlsx {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
}

/// Write the rows to `path`, choosing the table format from its extension.
///
/// # Errors
///
/// Returns [`TableError::UnsupportedExtension`] for anything other than
/// `.csv` or `.xlsx`, and a write error if the file cannot be produced.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn write_table(rows: &ValidationRows, path: &Path) -> Result<(), TableError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xlsx") => write_xlsx(rows, path).map_err(|source| TableError::Xlsx {
            path: path.to_path_buf(),
            source,
        })?,
        Some("csv") => write_csv(rows, path)?,
        _ => {
            return Err(TableError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }
    }
    tracing::info!(
        catalog_rows = rows.catalog.len(),
        dataset_rows = rows.dataset.len(),
        "exported validation table"
    );
    Ok(())
}

// --- xlsx ---

fn write_header(
    sheet: &mut Worksheet,
    headers: &[(&str, f64)],
    format: &Format,
) -> Result<(), XlsxError> {
    for (col, (name, width)) in (0u16..).zip(headers) {
        sheet.write_string_with_format(0, col, *name, format)?;
        sheet.set_column_width(col, *width)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_opt(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<&str>,
) -> Result<(), XlsxError> {
    if let Some(value) = value {
        sheet.write_string(row, col, value)?;
    }
    Ok(())
}

fn write_xlsx(rows: &ValidationRows, path: &Path) -> Result<(), XlsxError> {
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x00D9_E1F2))
        .set_text_wrap();
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("catalog")?;
    write_header(sheet, CATALOG_HEADERS, &header)?;
    for (row, entry) in (1u32..).zip(&rows.catalog) {
        write_opt(sheet, row, 0, entry.title.as_deref())?;
        sheet.write_string(row, 1, entry.status.as_str())?;
        write_opt(sheet, row, 2, entry.error_message.as_deref())?;
        write_opt(sheet, row, 3, entry.error_location.as_deref())?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("dataset")?;
    write_header(sheet, DATASET_HEADERS, &header)?;
    for (row, entry) in (1u32..).zip(&rows.dataset) {
        write_opt(sheet, row, 0, entry.title.as_deref())?;
        write_opt(sheet, row, 1, entry.identifier.as_deref())?;
        #[allow(clippy::cast_precision_loss)]
        sheet.write_number(row, 2, entry.list_index as f64)?;
        sheet.write_string(row, 3, entry.status.as_str())?;
        write_opt(sheet, row, 4, entry.error_message.as_deref())?;
        write_opt(sheet, row, 5, entry.error_location.as_deref())?;
    }

    workbook.save(path)
}

// --- csv ---

#[derive(Serialize)]
struct CsvRow<'a> {
    level: &'static str,
    title: Option<&'a str>,
    identifier: Option<&'a str>,
    list_index: Option<usize>,
    status: Status,
    error_message: Option<&'a str>,
    error_location: Option<&'a str>,
}

fn write_csv(rows: &ValidationRows, path: &Path) -> Result<(), TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

    let catalog = rows.catalog.iter().map(|r| CsvRow {
        level: "catalog",
        title: r.title.as_deref(),
        identifier: None,
        list_index: None,
        status: r.status,
        error_message: r.error_message.as_deref(),
        error_location: r.error_location.as_deref(),
    });
    let dataset = rows.dataset.iter().map(|r| CsvRow {
        level: "dataset",
        title: r.title.as_deref(),
        identifier: r.identifier.as_deref(),
        list_index: Some(r.list_index),
        status: r.status,
        error_message: r.error_message.as_deref(),
        error_location: r.error_location.as_deref(),
    });
    for row in catalog.chain(dataset) {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{CatalogRow, DatasetRow};

    fn rows() -> ValidationRows {
        ValidationRows {
            catalog: vec![CatalogRow {
                title: Some("Catalog".into()),
                status: Status::Error,
                error_message: Some("ids repeated".into()),
                error_location: Some("catalog, themeTaxonomy".into()),
            }],
            dataset: vec![
                DatasetRow {
                    title: Some("A".into()),
                    identifier: Some("a".into()),
                    list_index: 0,
                    status: Status::Ok,
                    error_message: None,
                    error_location: None,
                },
                DatasetRow {
                    title: Some("B".into()),
                    identifier: Some("b".into()),
                    list_index: 1,
                    status: Status::Error,
                    error_message: Some("'description' is a required property".into()),
                    error_location: Some("1".into()),
                },
            ],
        }
    }

    #[test]
    fn csv_has_level_column_and_all_rows() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.csv");
        write_table(&rows(), &path)?;

        let content = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "level,title,identifier,list_index,status,error_message,error_location"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("catalog,Catalog,,,ERROR,ids repeated,"));
        assert_eq!(lines[2], "dataset,A,a,0,OK,,");
        assert!(lines[3].starts_with("dataset,B,b,1,ERROR,"));
        Ok(())
    }

    #[test]
    fn xlsx_writes_a_zip_container() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.xlsx");
        write_table(&rows(), &path)?;

        let bytes = std::fs::read(&path)?;
        assert!(bytes.starts_with(b"PK"));
        Ok(())
    }

    #[test]
    fn extension_is_case_insensitive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("REPORT.CSV");
        write_table(&rows(), &path)?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.json");
        let err = write_table(&rows(), &path).expect_err("json is not a table format");
        assert!(matches!(err, TableError::UnsupportedExtension { .. }));
        assert!(!path.exists());

        let err = write_table(&rows(), &dir.path().join("report")).expect_err("no extension");
        assert!(matches!(err, TableError::UnsupportedExtension { .. }));
        Ok(())
    }
}
