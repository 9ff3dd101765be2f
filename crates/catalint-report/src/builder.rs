use serde_json::Value;

use crate::error::{RawError, ValidationError};
use crate::report::{
    CatalogEntry, DatasetEntry, ReportBody, Status, ValidationReport, ValidatorRun, value_text,
};

/// Folds schema and custom validation errors into a [`ValidationReport`].
///
/// The builder is seeded from the catalog so that every dataset has an entry
/// (and a stable `list_index`) even when it is not an object. Errors can be
/// pushed in any order: each one lands on the entity its path points at, so
/// the per-entity error sets do not depend on how the streams interleave.
pub struct ReportBuilder {
    report: ValidationReport,
}

impl ReportBuilder {
    pub fn new(catalog: &Value) -> Self {
        let catalog_entry = CatalogEntry {
            status: Status::Ok,
            title: value_text(catalog.get("title")),
            errors: Vec::new(),
        };

        let datasets = catalog
            .get("dataset")
            .and_then(Value::as_array)
            .map(|datasets| {
                datasets
                    .iter()
                    .enumerate()
                    .map(|(list_index, dataset)| DatasetEntry {
                        status: Status::Ok,
                        title: value_text(dataset.get("title")),
                        identifier: value_text(dataset.get("identifier")),
                        list_index,
                        errors: Vec::new(),
                    })
                    .collect()
            });

        Self {
            report: ValidationReport {
                status: Status::Ok,
                error: ReportBody {
                    catalog: catalog_entry,
                    dataset: datasets,
                },
                validators: Vec::new(),
            },
        }
    }

    /// Classify one error and attach it to the catalog or to a dataset.
    pub fn push(&mut self, raw: RawError) {
        let error = ValidationError::from(raw);
        let dataset = error.dataset_index().and_then(|i| {
            self.report
                .error
                .dataset
                .as_mut()
                .and_then(|datasets| datasets.get_mut(i))
        });

        match dataset {
            Some(entry) => {
                entry.status = Status::Error;
                entry.errors.push(error);
            }
            None => {
                let entry = &mut self.report.error.catalog;
                entry.status = Status::Error;
                entry.errors.push(error);
            }
        }
        self.report.status = Status::Error;
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = RawError>) {
        for raw in errors {
            self.push(raw);
        }
    }

    pub fn record_run(&mut self, run: ValidatorRun) {
        self.report.validators.push(run);
    }

    pub fn finish(self) -> ValidationReport {
        self.report
    }
}

/// Build a report from the schema errors and the custom validator errors of
/// one catalog.
pub fn build_report(
    catalog: &Value,
    schema_errors: impl IntoIterator<Item = RawError>,
    custom_errors: impl IntoIterator<Item = RawError>,
) -> ValidationReport {
    let mut builder = ReportBuilder::new(catalog);
    builder.extend(schema_errors);
    builder.extend(custom_errors);
    builder.finish()
}
