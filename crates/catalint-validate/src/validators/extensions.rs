use serde_json::Value;
use url::Url;

use catalint_config::ValidatorKind;
use catalint_report::RawError;

use super::{CustomError, RunError, SimpleValidator};
use crate::index::{CatalogIndex, DistributionRef};

/// Extensions that say nothing about the content behind them. A file with
/// one of these, or a distribution declaring one as its format, is never a
/// mismatch.
const MASKING_EXTENSIONS: &[&str] = &["zip", "php", "asp", "aspx"];

const CHECKED_ATTRIBUTES: &[&str] = &["downloadURL", "fileName"];

/// Extensions a declared `format` allows, lowercased. A MIME type expands to
/// all of its known extensions.
fn expected_extensions(format: &str) -> Vec<String> {
    if format.contains('/') {
        mime_guess::get_mime_extensions_str(format)
            .map(|exts| exts.iter().map(|e| e.to_ascii_lowercase()).collect())
            .unwrap_or_default()
    } else {
        vec![format.to_ascii_lowercase()]
    }
}

fn file_extension(name: &str) -> Option<String> {
    let last = name.rsplit('/').next().unwrap_or(name);
    let (stem, extension) = last.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Extension of the path component of a URL, ignoring query and fragment.
fn url_extension(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => file_extension(parsed.path()),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            file_extension(path)
        }
    }
}

/// Compare one attribute of a distribution with its declared format.
fn check_attribute(
    distribution: &DistributionRef<'_>,
    format: &str,
    attribute: &'static str,
    value: &str,
) -> Option<CustomError> {
    let actual = if attribute == "downloadURL" {
        // a download URL without an extension says nothing about its format
        url_extension(value)?
    } else {
        file_extension(value).unwrap_or_default()
    };

    let declared = format.to_ascii_lowercase();
    if MASKING_EXTENSIONS.contains(&actual.as_str())
        || MASKING_EXTENSIONS.contains(&declared.as_str())
    {
        return None;
    }

    let expected = expected_extensions(format);
    if expected.contains(&actual) {
        return None;
    }
    Some(CustomError::ExtensionMismatch {
        dataset_idx: distribution.dataset_index,
        distribution_idx: distribution.list_index,
        dataset_identifier: distribution.dataset_identifier.map(str::to_string),
        attribute,
        format: format.to_string(),
        value: value.to_string(),
        extension: actual,
        expected,
    })
}

/// A distribution's `format` must agree with the extension of its
/// `downloadURL` and `fileName`.
pub struct ConsistentDistributionFieldsValidator;

#[async_trait::async_trait]
impl SimpleValidator for ConsistentDistributionFieldsValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::ConsistentDistributionFields
    }

    async fn validate(&self, index: &CatalogIndex<'_>) -> Result<Vec<RawError>, RunError> {
        let mut errors = Vec::new();
        for distribution in index.distributions() {
            let Some(format) = distribution.get("format").and_then(Value::as_str) else {
                continue;
            };
            for &attribute in CHECKED_ATTRIBUTES {
                let Some(value) = distribution.get(attribute).and_then(Value::as_str) else {
                    continue;
                };
                if let Some(error) = check_attribute(distribution, format, attribute, value) {
                    errors.push(error.into_raw());
                }
            }
        }
        Ok(errors)
    }
}
