//! Read-only positional view of a catalog, built once per validation pass.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// One element of `catalog.dataset`, object or not.
#[derive(Debug, Clone, Copy)]
pub struct DatasetRef<'a> {
    pub list_index: usize,
    pub value: &'a Value,
}

impl<'a> DatasetRef<'a> {
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key)
    }

    pub fn title(&self) -> Option<&'a str> {
        self.get("title").and_then(Value::as_str)
    }

    pub fn identifier(&self) -> Option<&'a str> {
        self.get("identifier").and_then(Value::as_str)
    }
}

/// A distribution together with the dataset it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct DistributionRef<'a> {
    /// `list_index` of the owning dataset.
    pub dataset_index: usize,
    /// Position within the dataset's `distribution` array.
    pub list_index: usize,
    pub dataset_identifier: Option<&'a str>,
    pub value: &'a Map<String, Value>,
}

impl<'a> DistributionRef<'a> {
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key)
    }

    pub fn title(&self) -> Option<&'a str> {
        self.get("title").and_then(Value::as_str)
    }
}

/// Borrowed index over the datasets and distributions of a catalog.
///
/// Non-object distributions are skipped; datasets are kept regardless of
/// shape so that `list_index` always matches the report. Identifier lookups
/// resolve to the first dataset carrying that identifier.
#[derive(Debug)]
pub struct CatalogIndex<'a> {
    catalog: &'a Value,
    datasets: Vec<DatasetRef<'a>>,
    distributions: Vec<DistributionRef<'a>>,
    dataset_ids: HashMap<&'a str, usize>,
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = (usize, &Map<String, Value>)> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, v)| v.as_object().map(|o| (i, o)))
}

impl<'a> CatalogIndex<'a> {
    pub fn new(catalog: &'a Value) -> Self {
        let datasets: Vec<DatasetRef<'a>> = catalog
            .get("dataset")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(list_index, value)| DatasetRef { list_index, value })
            .collect();

        let mut distributions = Vec::new();
        let mut dataset_ids = HashMap::new();

        for dataset in &datasets {
            if let Some(id) = dataset.identifier() {
                dataset_ids.entry(id).or_insert(dataset.list_index);
            }
            for (list_index, value) in objects(dataset.get("distribution")) {
                distributions.push(DistributionRef {
                    dataset_index: dataset.list_index,
                    list_index,
                    dataset_identifier: dataset.identifier(),
                    value,
                });
            }
        }

        Self {
            catalog,
            datasets,
            distributions,
            dataset_ids,
        }
    }

    pub fn datasets(&self) -> &[DatasetRef<'a>] {
        &self.datasets
    }

    pub fn distributions(&self) -> &[DistributionRef<'a>] {
        &self.distributions
    }

    /// `themeTaxonomy` when it is an array, otherwise empty.
    pub fn theme_taxonomy(&self) -> &'a [Value] {
        self.catalog
            .get("themeTaxonomy")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn dataset(&self, identifier: &str) -> Option<&DatasetRef<'a>> {
        self.dataset_ids
            .get(identifier)
            .and_then(|&i| self.datasets.get(i))
    }
}
