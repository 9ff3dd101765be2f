//! Custom checks that JSON Schema cannot express.

mod extensions;
mod repeated;
mod urls;

use miette::Diagnostic;
use serde_json::{Value, json};
use thiserror::Error;

use catalint_config::ValidatorKind;
use catalint_report::{PathSegment, RawError, path};

use crate::index::CatalogIndex;
use crate::url_check::{HttpHead, UrlChecker};

pub use extensions::ConsistentDistributionFieldsValidator;
pub use repeated::{DatasetIdsNotRepeatedValidator, ThemeIdsNotRepeatedValidator};
pub use urls::{UrlTarget, UrlValidator};

/// A custom validator run over a [`CatalogIndex`].
///
/// Implementations never mutate the catalog. Every error they find is
/// returned; `Err` means the check itself could not complete.
#[async_trait::async_trait]
pub trait SimpleValidator: Send + Sync {
    fn kind(&self) -> ValidatorKind;

    /// Name recorded in the report's run list.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// # Errors
    ///
    /// Returns a [`RunError`] if the check could not run to completion.
    async fn validate(&self, index: &CatalogIndex<'_>) -> Result<Vec<RawError>, RunError>;
}

/// A custom validator that did not complete.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("validator panicked: {0}")]
    #[diagnostic(code(catalint::validator::panicked))]
    Panicked(String),

    #[error("{0}")]
    #[diagnostic(code(catalint::validator::failed))]
    Failed(String),
}

fn status_text(code: Option<u16>) -> String {
    code.map_or_else(|| "no response".to_string(), |c| format!("status {c}"))
}

fn title_text(title: Option<&String>) -> &str {
    title.map_or("untitled", String::as_str)
}

fn dataset_text(idx: usize, identifier: Option<&String>) -> String {
    match identifier {
        Some(id) => format!("dataset {idx} ({id})"),
        None => format!("dataset {idx}"),
    }
}

/// A semantic error found by a custom validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomError {
    #[error("theme ids are repeated in themeTaxonomy: {}", ids.join(", "))]
    ThemeIdRepeated { ids: Vec<String> },

    #[error("dataset identifiers are repeated: {}", ids.join(", "))]
    DatasetIdRepeated { ids: Vec<String> },

    #[error(
        "distribution {distribution_idx} of {}: {attribute} '{value}' has extension \
         '{extension}', which does not match format '{format}'",
        dataset_text(*dataset_idx, dataset_identifier.as_ref())
    )]
    ExtensionMismatch {
        dataset_idx: usize,
        distribution_idx: usize,
        dataset_identifier: Option<String>,
        attribute: &'static str,
        format: String,
        value: String,
        extension: String,
        expected: Vec<String>,
    },

    #[error(
        "landing page {url} of dataset '{}' is not reachable ({})",
        title_text(dataset_title.as_ref()),
        status_text(*status_code)
    )]
    BrokenLandingPage {
        dataset_idx: usize,
        dataset_title: Option<String>,
        url: String,
        status_code: Option<u16>,
    },

    #[error(
        "accessURL {url} of distribution '{}' in {} is not reachable ({})",
        title_text(distribution_title.as_ref()),
        dataset_text(*dataset_idx, dataset_identifier.as_ref()),
        status_text(*status_code)
    )]
    BrokenAccessUrl {
        dataset_idx: usize,
        distribution_idx: usize,
        dataset_identifier: Option<String>,
        distribution_title: Option<String>,
        url: String,
        status_code: Option<u16>,
    },

    #[error(
        "downloadURL {url} of distribution '{}' in {} is not reachable ({})",
        title_text(distribution_title.as_ref()),
        dataset_text(*dataset_idx, dataset_identifier.as_ref()),
        status_text(*status_code)
    )]
    BrokenDownloadUrl {
        dataset_idx: usize,
        distribution_idx: usize,
        dataset_identifier: Option<String>,
        distribution_title: Option<String>,
        url: String,
        status_code: Option<u16>,
    },
}

impl CustomError {
    /// Keyword recorded as the error's `validator`.
    pub fn validator(&self) -> &'static str {
        match self {
            Self::ThemeIdRepeated { .. } | Self::DatasetIdRepeated { .. } => "repeatedValue",
            Self::ExtensionMismatch { .. } => "mismatchedValue",
            Self::BrokenLandingPage { .. }
            | Self::BrokenAccessUrl { .. }
            | Self::BrokenDownloadUrl { .. } => "brokenLink",
        }
    }

    pub fn path(&self) -> Vec<PathSegment> {
        match self {
            Self::ThemeIdRepeated { .. } => path!["catalog", "themeTaxonomy"],
            Self::DatasetIdRepeated { .. } => path!["catalog", "dataset"],
            Self::ExtensionMismatch {
                dataset_idx,
                distribution_idx,
                attribute,
                ..
            } => path!["dataset", *dataset_idx, "distribution", *distribution_idx, *attribute],
            Self::BrokenLandingPage { dataset_idx, .. } => {
                path!["dataset", *dataset_idx, "landingPage"]
            }
            Self::BrokenAccessUrl {
                dataset_idx,
                distribution_idx,
                ..
            } => path!["dataset", *dataset_idx, "distribution", *distribution_idx, "accessURL"],
            Self::BrokenDownloadUrl {
                dataset_idx,
                distribution_idx,
                ..
            } => path!["dataset", *dataset_idx, "distribution", *distribution_idx, "downloadURL"],
        }
    }

    /// The rule that was broken.
    pub fn validator_value(&self) -> Value {
        match self {
            Self::ThemeIdRepeated { .. } => json!({"unique": "id"}),
            Self::DatasetIdRepeated { .. } => json!({"unique": "identifier"}),
            Self::ExtensionMismatch {
                format, expected, ..
            } => json!({"format": format, "expected_extensions": expected}),
            Self::BrokenLandingPage { status_code, .. }
            | Self::BrokenAccessUrl { status_code, .. }
            | Self::BrokenDownloadUrl { status_code, .. } => json!({"status_code": status_code}),
        }
    }

    /// The offending value.
    pub fn instance(&self) -> Value {
        match self {
            Self::ThemeIdRepeated { ids } | Self::DatasetIdRepeated { ids } => json!(ids),
            Self::ExtensionMismatch { value, .. } => json!(value),
            Self::BrokenLandingPage { url, .. }
            | Self::BrokenAccessUrl { url, .. }
            | Self::BrokenDownloadUrl { url, .. } => json!(url),
        }
    }

    pub fn into_raw(self) -> RawError {
        RawError {
            validator: self.validator().to_string(),
            message: self.to_string(),
            validator_value: self.validator_value(),
            path: self.path(),
            instance: self.instance(),
        }
    }
}

/// Build the validator for `kind`. Link checks share `checker`.
pub fn build<H: HttpHead>(
    kind: ValidatorKind,
    checker: &UrlChecker<H>,
) -> Box<dyn SimpleValidator> {
    match kind {
        ValidatorKind::ThemeIdsNotRepeated => Box::new(ThemeIdsNotRepeatedValidator),
        ValidatorKind::DatasetIdsNotRepeated => Box::new(DatasetIdsNotRepeatedValidator),
        ValidatorKind::ConsistentDistributionFields => {
            Box::new(ConsistentDistributionFieldsValidator)
        }
        ValidatorKind::LandingPages => {
            Box::new(UrlValidator::new(UrlTarget::LandingPages, checker.clone()))
        }
        ValidatorKind::DistributionUrls => {
            Box::new(UrlValidator::new(UrlTarget::DistributionUrls, checker.clone()))
        }
        ValidatorKind::DistributionDownloadUrls => Box::new(UrlValidator::new(
            UrlTarget::DistributionDownloadUrls,
            checker.clone(),
        )),
    }
}
