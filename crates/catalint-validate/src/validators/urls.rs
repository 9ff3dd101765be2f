use serde_json::Value;

use catalint_config::ValidatorKind;
use catalint_report::{RawError, value_text};

use super::{CustomError, RunError, SimpleValidator};
use crate::index::CatalogIndex;
use crate::url_check::{HttpHead, ReqwestHead, UrlChecker, UrlStatus};

/// Which URLs of a catalog a [`UrlValidator`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlTarget {
    /// `landingPage` of every dataset.
    LandingPages,
    /// `accessURL` and `downloadURL` of every distribution.
    DistributionUrls,
    /// `downloadURL` of every distribution.
    DistributionDownloadUrls,
}

impl UrlTarget {
    fn kind(self) -> ValidatorKind {
        match self {
            Self::LandingPages => ValidatorKind::LandingPages,
            Self::DistributionUrls => ValidatorKind::DistributionUrls,
            Self::DistributionDownloadUrls => ValidatorKind::DistributionDownloadUrls,
        }
    }

    fn attributes(self) -> &'static [&'static str] {
        match self {
            Self::LandingPages => &["landingPage"],
            Self::DistributionUrls => &["accessURL", "downloadURL"],
            Self::DistributionDownloadUrls => &["downloadURL"],
        }
    }
}

/// One URL to check and where it was found.
struct LinkTarget<'a> {
    dataset_idx: usize,
    distribution_idx: Option<usize>,
    dataset_identifier: Option<&'a str>,
    attribute: &'static str,
    title: Option<&'a str>,
    value: &'a Value,
}

impl LinkTarget<'_> {
    fn into_error(self, status: UrlStatus) -> CustomError {
        let url = value_text(Some(self.value)).unwrap_or_default();
        let title = self.title.map(str::to_string);
        let dataset_identifier = self.dataset_identifier.map(str::to_string);
        match (self.distribution_idx, self.attribute) {
            (None, _) => CustomError::BrokenLandingPage {
                dataset_idx: self.dataset_idx,
                dataset_title: title,
                url,
                status_code: status.status_code,
            },
            (Some(distribution_idx), "accessURL") => CustomError::BrokenAccessUrl {
                dataset_idx: self.dataset_idx,
                distribution_idx,
                dataset_identifier,
                distribution_title: title,
                url,
                status_code: status.status_code,
            },
            (Some(distribution_idx), _) => CustomError::BrokenDownloadUrl {
                dataset_idx: self.dataset_idx,
                distribution_idx,
                dataset_identifier,
                distribution_title: title,
                url,
                status_code: status.status_code,
            },
        }
    }
}

/// Checks one family of catalog URLs and reports each one that is broken.
///
/// Only keys present with a non-null value are checked. A value that is not a
/// string is reported as unreachable without issuing a request.
pub struct UrlValidator<H: HttpHead = ReqwestHead> {
    target: UrlTarget,
    checker: UrlChecker<H>,
}

impl<H: HttpHead> UrlValidator<H> {
    pub fn new(target: UrlTarget, checker: UrlChecker<H>) -> Self {
        Self { target, checker }
    }

    fn targets<'a>(&self, index: &CatalogIndex<'a>) -> Vec<LinkTarget<'a>> {
        let present = |value: Option<&'a Value>| value.filter(|v| !v.is_null());
        let mut targets = Vec::new();
        if self.target == UrlTarget::LandingPages {
            for dataset in index.datasets() {
                if let Some(value) = present(dataset.get("landingPage")) {
                    targets.push(LinkTarget {
                        dataset_idx: dataset.list_index,
                        distribution_idx: None,
                        dataset_identifier: dataset.identifier(),
                        attribute: "landingPage",
                        title: dataset.title(),
                        value,
                    });
                }
            }
            return targets;
        }
        for distribution in index.distributions() {
            for &attribute in self.target.attributes() {
                if let Some(value) = present(distribution.get(attribute)) {
                    targets.push(LinkTarget {
                        dataset_idx: distribution.dataset_index,
                        distribution_idx: Some(distribution.list_index),
                        dataset_identifier: distribution.dataset_identifier,
                        attribute,
                        title: distribution.title(),
                        value,
                    });
                }
            }
        }
        targets
    }
}

#[async_trait::async_trait]
impl<H: HttpHead> SimpleValidator for UrlValidator<H> {
    fn kind(&self) -> ValidatorKind {
        self.target.kind()
    }

    async fn validate(&self, index: &CatalogIndex<'_>) -> Result<Vec<RawError>, RunError> {
        let targets = self.targets(index);
        let urls: Vec<Option<&str>> = targets.iter().map(|p| p.value.as_str()).collect();
        let statuses = self.checker.check_all(&urls).await;

        let errors: Vec<RawError> = targets
            .into_iter()
            .zip(statuses)
            .filter(|(_, status)| !status.is_valid)
            .map(|(target, status)| target.into_error(status).into_raw())
            .collect();
        tracing::info!(
            validator = self.name(),
            checked = urls.len(),
            broken = errors.len(),
            "checked urls"
        );
        Ok(errors)
    }
}
