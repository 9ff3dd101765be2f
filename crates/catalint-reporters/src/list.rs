use serde::Serialize;

use catalint_report::{Status, ValidationError, ValidationReport};

/// One catalog-level row: an error, or the single row of a clean catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRow {
    pub title: Option<String>,
    pub status: Status,
    pub error_message: Option<String>,
    /// Full error path, comma-separated.
    pub error_location: Option<String>,
}

/// One dataset-level row: an error, or the single row of a clean dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRow {
    pub title: Option<String>,
    pub identifier: Option<String>,
    pub list_index: usize,
    pub status: Status,
    pub error_message: Option<String>,
    /// Last segment of the error path.
    pub error_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRows {
    pub catalog: Vec<CatalogRow>,
    pub dataset: Vec<DatasetRow>,
}

fn join_path(error: &ValidationError) -> String {
    error
        .path
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Flatten a report into rows.
pub fn to_rows(report: &ValidationReport) -> ValidationRows {
    let entry = &report.error.catalog;
    let mut catalog: Vec<CatalogRow> = entry
        .errors
        .iter()
        .map(|error| CatalogRow {
            title: entry.title.clone(),
            status: entry.status,
            error_message: Some(error.message.clone()),
            error_location: Some(join_path(error)),
        })
        .collect();
    if catalog.is_empty() {
        catalog.push(CatalogRow {
            title: entry.title.clone(),
            status: entry.status,
            error_message: None,
            error_location: None,
        });
    }

    let mut dataset = Vec::new();
    for ds in report.error.dataset.iter().flatten() {
        let row = |error: Option<&ValidationError>| DatasetRow {
            title: ds.title.clone(),
            identifier: ds.identifier.clone(),
            list_index: ds.list_index,
            status: ds.status,
            error_message: error.map(|e| e.message.clone()),
            error_location: error.and_then(|e| e.path.last()).map(ToString::to_string),
        };
        if ds.errors.is_empty() {
            dataset.push(row(None));
        } else {
            dataset.extend(ds.errors.iter().map(|e| row(Some(e))));
        }
    }

    ValidationRows { catalog, dataset }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalint_report::{PathSegment, RawError, build_report};
    use serde_json::{Value, json};

    fn raw(validator: &str, message: &str, path: Vec<PathSegment>) -> RawError {
        RawError {
            validator: validator.to_string(),
            message: message.to_string(),
            validator_value: Value::Null,
            path,
            instance: Value::Null,
        }
    }

    fn catalog() -> Value {
        json!({
            "title": "Catalog",
            "dataset": [
                {"title": "A", "identifier": "a"},
                {"title": "B", "identifier": "b"}
            ]
        })
    }

    #[test]
    fn clean_report_has_one_row_per_entity() {
        let rows = to_rows(&build_report(&catalog(), vec![], vec![]));
        assert_eq!(rows.catalog.len(), 1);
        assert_eq!(rows.catalog[0].status, Status::Ok);
        assert_eq!(rows.catalog[0].error_message, None);
        assert_eq!(rows.dataset.len(), 2);
        assert_eq!(rows.dataset[1].identifier.as_deref(), Some("b"));
        assert_eq!(rows.dataset[1].list_index, 1);
    }

    #[test]
    fn catalog_rows_join_the_full_path() {
        let report = build_report(
            &catalog(),
            vec![],
            vec![raw(
                "repeatedValue",
                "ids repeated",
                catalint_report::path!["catalog", "themeTaxonomy"],
            )],
        );
        let rows = to_rows(&report);
        assert_eq!(rows.catalog.len(), 1);
        assert_eq!(rows.catalog[0].error_location.as_deref(), Some("catalog, themeTaxonomy"));
        assert_eq!(rows.catalog[0].status, Status::Error);
    }

    #[test]
    fn dataset_rows_use_the_last_segment() {
        let report = build_report(
            &catalog(),
            vec![
                raw(
                    "required",
                    "\"description\" is a required property",
                    catalint_report::path!["dataset", 0],
                ),
                raw(
                    "format",
                    "bad uri",
                    catalint_report::path!["dataset", 0, "distribution", 1, "accessURL"],
                ),
            ],
            vec![],
        );
        let rows = to_rows(&report);
        let first: Vec<_> = rows.dataset.iter().filter(|r| r.list_index == 0).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].error_location.as_deref(), Some("0"));
        assert_eq!(first[1].error_location.as_deref(), Some("accessURL"));
        assert_eq!(rows.dataset.len(), 3);
    }

    #[test]
    fn rows_of_an_errors_only_report_skip_clean_datasets() {
        let report = build_report(
            &catalog(),
            vec![raw("required", "missing", catalint_report::path!["dataset", 1])],
            vec![],
        );
        let rows = to_rows(&report.only_errors());
        assert_eq!(rows.catalog.len(), 1);
        assert_eq!(rows.dataset.len(), 1);
        assert_eq!(rows.dataset[0].identifier.as_deref(), Some("b"));
    }

    #[test]
    fn missing_dataset_array_gives_no_dataset_rows() {
        let rows = to_rows(&build_report(&json!({"title": "T"}), vec![], vec![]));
        assert!(rows.dataset.is_empty());
    }

    #[test]
    fn rows_serialize_with_uppercase_status() -> anyhow::Result<()> {
        let rows = to_rows(&build_report(&catalog(), vec![], vec![]));
        let value = serde_json::to_value(&rows)?;
        assert_eq!(value["catalog"][0]["status"], json!("OK"));
        assert_eq!(value["dataset"][0]["error_message"], json!(null));
        Ok(())
    }
}
