use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Status of the report root or of one of its entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Ok,
    Error,
}

impl Status {
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
        }
    }
}

/// Catalog-level entry of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub status: Status,
    pub title: Option<String>,
    pub errors: Vec<ValidationError>,
}

/// Report entry for one element of the catalog's `dataset` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub status: Status,
    pub title: Option<String>,
    pub identifier: Option<String>,
    /// Position of the dataset in `catalog.dataset`.
    pub list_index: usize,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBody {
    pub catalog: CatalogEntry,
    /// `None` when the catalog has no `dataset` array.
    pub dataset: Option<Vec<DatasetEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Failed,
}

/// Outcome of one custom validator during a validation pass.
///
/// A validator that fails internally contributes no errors to the report;
/// this record is what keeps that loss of coverage visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRun {
    pub name: String,
    pub status: RunStatus,
    pub error_count: usize,
    pub message: Option<String>,
}

impl ValidatorRun {
    pub fn succeeded(name: impl Into<String>, error_count: usize) -> Self {
        Self {
            name: name.into(),
            status: RunStatus::Ok,
            error_count,
            message: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RunStatus::Failed,
            error_count: 0,
            message: Some(message.into()),
        }
    }
}

/// The hierarchical result of validating one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: Status,
    pub error: ReportBody,
    #[serde(default)]
    pub validators: Vec<ValidatorRun>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Total number of errors across the catalog and every dataset.
    pub fn error_count(&self) -> usize {
        let datasets = self
            .error
            .dataset
            .iter()
            .flatten()
            .map(|d| d.errors.len())
            .sum::<usize>();
        self.error.catalog.errors.len() + datasets
    }

    /// Names of the custom validators that did not complete.
    pub fn failed_validators(&self) -> impl Iterator<Item = &str> {
        self.validators
            .iter()
            .filter(|run| run.status == RunStatus::Failed)
            .map(|run| run.name.as_str())
    }

    /// Keep only the dataset entries whose status is `ERROR`.
    #[must_use]
    pub fn only_errors(mut self) -> Self {
        if let Some(datasets) = self.error.dataset.as_mut() {
            datasets.retain(|d| d.status.is_error());
        }
        self
    }
}

/// Render a catalog value as report text.
///
/// Strings are taken as-is, `null` and missing values become `None`, and any
/// other JSON value is rendered compactly.
pub fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
