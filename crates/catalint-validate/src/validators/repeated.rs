use alloc::collections::BTreeMap;
use std::collections::HashMap;

use serde_json::Value;

use catalint_config::ValidatorKind;
use catalint_report::RawError;

use super::{CustomError, RunError, SimpleValidator};
use crate::index::CatalogIndex;

/// Ids that occur more than once, in order of first occurrence.
fn repeated<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut order = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in ids {
        let count = counts.entry(id).or_insert(0);
        if *count == 0 {
            order.push(id);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter(|id| counts.get(id).is_some_and(|&c| c > 1))
        .map(str::to_string)
        .collect()
}

/// Every `id` in `themeTaxonomy` must be unique.
pub struct ThemeIdsNotRepeatedValidator;

#[async_trait::async_trait]
impl SimpleValidator for ThemeIdsNotRepeatedValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::ThemeIdsNotRepeated
    }

    async fn validate(&self, index: &CatalogIndex<'_>) -> Result<Vec<RawError>, RunError> {
        let ids = repeated(
            index
                .theme_taxonomy()
                .iter()
                .filter_map(|theme| theme.get("id").and_then(Value::as_str)),
        );
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![CustomError::ThemeIdRepeated { ids }.into_raw()])
    }
}

/// Every dataset `identifier` must be unique within the catalog.
pub struct DatasetIdsNotRepeatedValidator;

#[async_trait::async_trait]
impl SimpleValidator for DatasetIdsNotRepeatedValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::DatasetIdsNotRepeated
    }

    async fn validate(&self, index: &CatalogIndex<'_>) -> Result<Vec<RawError>, RunError> {
        // a dataset whose identifier resolves elsewhere repeats an earlier one;
        // keying by the first holder keeps first-occurrence order
        let mut first_holders: BTreeMap<usize, &str> = BTreeMap::new();
        for dataset in index.datasets() {
            let Some(id) = dataset.identifier() else {
                continue;
            };
            if let Some(first) = index.dataset(id)
                && first.list_index != dataset.list_index
            {
                first_holders.insert(first.list_index, id);
            }
        }
        let ids: Vec<String> = first_holders.into_values().map(str::to_string).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![CustomError::DatasetIdRepeated { ids }.into_raw()])
    }
}
