use core::any::Any;
use core::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures_util::FutureExt;
use miette::Diagnostic;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use catalint_config::{Config, ValidatorKind};
use catalint_report::{ReportBuilder, ValidationReport, ValidatorRun};
use catalint_reporters::{ResponseFormat, TableError, ValidationRows, to_rows, write_table};

use crate::index::CatalogIndex;
use crate::schema::{DEFAULT_SCHEMA_FILE, SchemaError, SchemaValidator};
use crate::url_check::{HttpHead, ReqwestHead, UrlCheckOptions, UrlChecker};
use crate::validators::{self, RunError, SimpleValidator};

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to build the HTTP client for URL checks")]
    #[diagnostic(code(catalint::http_client))]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Table(#[from] TableError),
}

/// What [`Engine::validate_catalog`] returns when nothing is exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationOutput {
    Dict(ValidationReport),
    List(ValidationRows),
}

/// Configures and builds an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    schema_dir: Option<PathBuf>,
    schema_file: Option<String>,
    validators: Option<Vec<ValidatorKind>>,
    check_urls: bool,
    url_check: UrlCheckOptions,
    strict: bool,
    extra: Vec<Box<dyn SimpleValidator>>,
}

impl EngineBuilder {
    /// Start from a loaded `catalint.toml`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            schema_dir: config.schema.dir.clone(),
            schema_file: config.schema.file.clone(),
            validators: config.validators.clone(),
            check_urls: config.check_urls.unwrap_or(false),
            url_check: UrlCheckOptions::from(&config.url_check),
            strict: config.strict.unwrap_or(false),
            extra: Vec::new(),
        }
    }

    /// Load schemas from a directory instead of the bundled ones.
    #[must_use]
    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    /// Master schema file. Without [`schema_dir`](Self::schema_dir) this is
    /// a path, and its directory becomes the schema directory.
    #[must_use]
    pub fn schema_file(mut self, file: impl Into<String>) -> Self {
        self.schema_file = Some(file.into());
        self
    }

    /// Run exactly these custom validators, in this order.
    #[must_use]
    pub fn validators(mut self, kinds: Vec<ValidatorKind>) -> Self {
        self.validators = Some(kinds);
        self
    }

    /// Add the link checks to the default validators.
    #[must_use]
    pub fn check_urls(mut self, check_urls: bool) -> Self {
        self.check_urls = check_urls;
        self
    }

    #[must_use]
    pub fn url_check(mut self, options: UrlCheckOptions) -> Self {
        self.url_check = options;
        self
    }

    /// Make a validator that fails to run invalidate the catalog.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register a validator after the configured ones.
    #[must_use]
    pub fn with_validator(mut self, validator: Box<dyn SimpleValidator>) -> Self {
        self.extra.push(validator);
        self
    }

    fn load_schema(&self) -> Result<SchemaValidator, SchemaError> {
        match (&self.schema_dir, &self.schema_file) {
            (Some(dir), file) => {
                SchemaValidator::from_dir(file.as_deref().unwrap_or(DEFAULT_SCHEMA_FILE), dir)
            }
            (None, Some(file)) => {
                let path = Path::new(file);
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or(file);
                SchemaValidator::from_dir(name, dir)
            }
            (None, None) => SchemaValidator::builtin(),
        }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Schema`] if the schemas cannot be loaded and
    /// [`EngineError::HttpClient`] if the HTTP client cannot be built.
    pub fn build(self) -> Result<Engine, EngineError> {
        let head = ReqwestHead::new(&self.url_check)?;
        self.build_with_client(head)
    }

    /// Build with a custom HTTP transport for the link checks.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Schema`] if the schemas cannot be loaded.
    pub fn build_with_client<H: HttpHead>(self, head: H) -> Result<Engine, EngineError> {
        let schema = self.load_schema()?;
        let checker = UrlChecker::with_client(head, &self.url_check);
        let kinds = ValidatorKind::enabled(self.validators.as_deref(), self.check_urls);
        tracing::debug!(?kinds, strict = self.strict, "building engine");

        let mut validators: Vec<Box<dyn SimpleValidator>> = kinds
            .into_iter()
            .map(|kind| validators::build(kind, &checker))
            .collect();
        validators.extend(self.extra);

        Ok(Engine {
            schema,
            validators,
            strict: self.strict,
        })
    }
}

/// Validates catalogs against a schema set and a list of custom validators.
pub struct Engine {
    schema: SchemaValidator,
    validators: Vec<Box<dyn SimpleValidator>>,
    strict: bool,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Names of the registered custom validators, in run order.
    pub fn validator_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.validators.iter().map(|v| v.name())
    }

    async fn run_validator(
        validator: &dyn SimpleValidator,
        index: &CatalogIndex<'_>,
    ) -> Result<Vec<catalint_report::RawError>, RunError> {
        AssertUnwindSafe(validator.validate(index))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(RunError::Panicked(panic_message(&*payload))))
    }

    /// Validate `catalog` and build its report.
    ///
    /// A custom validator that fails or panics contributes no errors; its
    /// failure is logged and recorded in the report's `validators` list.
    #[tracing::instrument(skip_all)]
    pub async fn validate(&self, catalog: &Value) -> ValidationReport {
        let index = CatalogIndex::new(catalog);
        let mut builder = ReportBuilder::new(catalog);
        builder.extend(self.schema.iter_errors(catalog));

        for validator in &self.validators {
            let name = validator.name();
            match Self::run_validator(validator.as_ref(), &index).await {
                Ok(errors) => {
                    builder.record_run(ValidatorRun::succeeded(name, errors.len()));
                    builder.extend(errors);
                }
                Err(error) => {
                    tracing::warn!(validator = name, %error, "validator did not complete");
                    builder.record_run(ValidatorRun::failed(name, error.to_string()));
                }
            }
        }

        let report = builder.finish();
        tracing::info!(
            status = report.status.as_str(),
            errors = report.error_count(),
            "validated catalog"
        );
        report
    }

    /// Whether `catalog` has no schema or custom errors. In strict mode every
    /// custom validator must also have completed.
    pub async fn is_valid_catalog(&self, catalog: &Value) -> bool {
        self.is_valid_report(&self.validate(catalog).await)
    }

    /// The verdict [`is_valid_catalog`](Self::is_valid_catalog) gives for an
    /// already built report.
    pub fn is_valid_report(&self, report: &ValidationReport) -> bool {
        report.is_ok() && !(self.strict && report.failed_validators().next().is_some())
    }

    /// Validate `catalog` and shape the result.
    ///
    /// With `export_path` the rows are written to a `.csv` or `.xlsx` table
    /// and `None` is returned. `only_errors` drops datasets without errors.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Table`] if the export fails.
    #[tracing::instrument(skip_all, fields(%format, only_errors = only_errors))]
    pub async fn validate_catalog(
        &self,
        catalog: &Value,
        format: ResponseFormat,
        only_errors: bool,
        export_path: Option<&Path>,
    ) -> Result<Option<ValidationOutput>, EngineError> {
        render(self.validate(catalog).await, format, only_errors, export_path)
    }
}

/// Shape a report the way [`Engine::validate_catalog`] does.
///
/// # Errors
///
/// Returns [`EngineError::Table`] if the export fails.
pub fn render(
    report: ValidationReport,
    format: ResponseFormat,
    only_errors: bool,
    export_path: Option<&Path>,
) -> Result<Option<ValidationOutput>, EngineError> {
    let report = if only_errors {
        report.only_errors()
    } else {
        report
    };

    if let Some(path) = export_path {
        write_table(&to_rows(&report), path)?;
        return Ok(None);
    }

    Ok(Some(match format {
        ResponseFormat::Dict => ValidationOutput::Dict(report),
        ResponseFormat::List => ValidationOutput::List(to_rows(&report)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_check::HeadError;
    use catalint_report::{ErrorCode, RunStatus, Status, path};
    use serde_json::json;

    fn catalog() -> Value {
        json!({
            "title": "Catalog",
            "description": "A catalog",
            "publisher": {"name": "Ministry", "mbox": "data@example.org"},
            "themeTaxonomy": [{"id": "econ", "label": "Economy"}],
            "dataset": [
                {
                    "identifier": "1",
                    "title": "Budget",
                    "description": "Yearly budget",
                    "publisher": {"name": "Ministry"},
                    "superTheme": ["ECON"],
                    "issued": "2020-01-01",
                    "accrualPeriodicity": "R/P1Y",
                    "landingPage": "https://ok.test/budget",
                    "distribution": [{
                        "accessURL": "https://ok.test/budget",
                        "downloadURL": "https://ok.test/budget.csv",
                        "title": "Budget CSV",
                        "issued": "2020-01-01",
                        "format": "CSV"
                    }]
                },
                {
                    "identifier": "2",
                    "title": "Staff",
                    "description": "Headcount",
                    "publisher": {"name": "Ministry"},
                    "superTheme": ["GOVE"],
                    "issued": "2021-06-30",
                    "accrualPeriodicity": "eventual",
                    "landingPage": "https://gone.test/staff",
                    "distribution": [{
                        "accessURL": "https://ok.test/staff",
                        "downloadURL": "https://ok.test/staff.xlsx",
                        "title": "Staff XLSX",
                        "issued": "2021-06-30",
                        "format": "XLSX"
                    }]
                }
            ]
        })
    }

    #[derive(Clone)]
    struct MockHead;

    #[async_trait::async_trait]
    impl HttpHead for MockHead {
        async fn head(&self, url: &str) -> Result<u16, HeadError> {
            if url.starts_with("https://ok.test/") {
                Ok(200)
            } else if url.starts_with("https://gone.test/") {
                Ok(404)
            } else {
                Err(HeadError::Transport("unknown host".into()))
            }
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl SimpleValidator for Panicking {
        fn kind(&self) -> ValidatorKind {
            ValidatorKind::ThemeIdsNotRepeated
        }

        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn validate(
            &self,
            _index: &CatalogIndex<'_>,
        ) -> Result<Vec<catalint_report::RawError>, RunError> {
            panic!("index out of bounds");
        }
    }

    fn engine() -> anyhow::Result<Engine> {
        Ok(Engine::builder().build_with_client(MockHead)?)
    }

    #[tokio::test]
    async fn clean_catalog_is_valid() -> anyhow::Result<()> {
        let engine = engine()?;
        let catalog = catalog();
        assert!(engine.is_valid_catalog(&catalog).await);

        let report = engine.validate(&catalog).await;
        assert_eq!(report.status, Status::Ok);
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.validators.len(), ValidatorKind::DEFAULTS.len());
        assert!(report.validators.iter().all(|r| r.status == RunStatus::Ok));
        Ok(())
    }

    #[tokio::test]
    async fn missing_dataset_key() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog.as_object_mut().expect("object").remove("dataset");

        let report = engine.validate(&catalog).await;
        assert_eq!(report.status, Status::Error);
        assert!(report.error.dataset.is_none());
        assert_eq!(report.error.catalog.errors.len(), 1);
        let error = &report.error.catalog.errors[0];
        assert_eq!(error.error_code, ErrorCode::MissingRequired);
        assert_eq!(error.validator, "required");
        assert_eq!(error.instance, Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn missing_dataset_description() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog["dataset"][0]
            .as_object_mut()
            .expect("object")
            .remove("description");

        assert!(!engine.is_valid_catalog(&catalog).await);
        let report = engine.validate(&catalog).await;
        assert_eq!(report.error.catalog.status, Status::Ok);
        let datasets = report.error.dataset.expect("datasets");
        assert_eq!(datasets[0].status, Status::Error);
        assert_eq!(datasets[0].errors.len(), 1);
        let error = &datasets[0].errors[0];
        assert_eq!(error.validator, "required");
        assert_eq!(error.error_code, ErrorCode::MissingRequired);
        assert_eq!(error.path, path!["dataset", 0]);
        assert!(error.message.contains("description"));
        assert_eq!(datasets[1].status, Status::Ok);
        Ok(())
    }

    #[tokio::test]
    async fn missing_description_at_both_levels() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog
            .as_object_mut()
            .expect("object")
            .remove("description");
        catalog["dataset"][0]
            .as_object_mut()
            .expect("object")
            .remove("description");

        assert!(!engine.is_valid_catalog(&catalog).await);
        let report = engine.validate(&catalog).await;
        assert_eq!(report.status, Status::Error);

        let catalog_errors = &report.error.catalog.errors;
        assert_eq!(report.error.catalog.status, Status::Error);
        assert_eq!(catalog_errors.len(), 1);
        assert_eq!(catalog_errors[0].error_code, ErrorCode::MissingRequired);
        assert_eq!(catalog_errors[0].path, Vec::<catalint_report::PathSegment>::new());
        assert_eq!(
            catalog_errors[0].validator_value,
            json!(["dataset", "title", "description", "publisher"])
        );

        let datasets = report.error.dataset.expect("datasets");
        assert_eq!(datasets[0].errors.len(), 1);
        assert_eq!(datasets[0].errors[0].error_code, ErrorCode::MissingRequired);
        assert_eq!(datasets[0].errors[0].path, path!["dataset", 0]);
        assert_eq!(datasets[0].errors[0].instance, Value::Null);
        assert!(
            datasets[0].errors[0]
                .validator_value
                .as_array()
                .is_some_and(|keys| keys.contains(&json!("superTheme")))
        );
        assert_eq!(datasets[1].status, Status::Ok);
        Ok(())
    }

    #[tokio::test]
    async fn errors_attach_to_their_dataset() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog["dataset"][1]["distribution"][0]["fileName"] = json!("staff.pdf");

        let report = engine.validate(&catalog).await;
        let datasets = report.error.dataset.expect("datasets");
        assert_eq!(datasets[0].status, Status::Ok);
        assert_eq!(datasets[1].errors.len(), 1);
        assert_eq!(datasets[1].errors[0].validator, "mismatchedValue");
        assert_eq!(datasets[1].errors[0].path, path!["dataset", 1, "distribution", 0, "fileName"]);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_theme_ids_are_catalog_errors() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog["themeTaxonomy"] = json!([
            {"id": "a", "label": "A"},
            {"id": "a", "label": "A again"},
            {"id": "b", "label": "B"}
        ]);

        let report = engine.validate(&catalog).await;
        assert_eq!(report.error.catalog.errors.len(), 1);
        assert_eq!(report.error.catalog.errors[0].instance, json!(["a"]));
        Ok(())
    }

    #[tokio::test]
    async fn validation_is_idempotent() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog["dataset"][0]["issued"] = json!("yesterday");
        catalog["title"] = json!("");

        let first = serde_json::to_string(&engine.validate(&catalog).await)?;
        let second = serde_json::to_string(&engine.validate(&catalog).await)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn link_checks_report_broken_urls() -> anyhow::Result<()> {
        let engine = Engine::builder()
            .check_urls(true)
            .build_with_client(MockHead)?;
        let report = engine.validate(&catalog()).await;

        let datasets = report.error.dataset.expect("datasets");
        assert_eq!(datasets[0].status, Status::Ok);
        assert_eq!(datasets[1].errors.len(), 1);
        assert_eq!(datasets[1].errors[0].validator, "brokenLink");
        assert_eq!(datasets[1].errors[0].path, path!["dataset", 1, "landingPage"]);
        assert_eq!(
            report.validators.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec![
                "theme-ids-not-repeated",
                "dataset-ids-not-repeated",
                "consistent-distribution-fields",
                "landing-pages",
                "distribution-urls",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn panicking_validator_is_recorded_not_fatal() -> anyhow::Result<()> {
        let engine = Engine::builder()
            .validators(vec![ValidatorKind::ThemeIdsNotRepeated])
            .with_validator(Box::new(Panicking))
            .build_with_client(MockHead)?;
        let catalog = catalog();

        let report = engine.validate(&catalog).await;
        assert!(report.is_ok());
        assert_eq!(report.failed_validators().collect::<Vec<_>>(), vec!["panicking"]);
        let failed = &report.validators[1];
        assert!(
            failed
                .message
                .as_deref()
                .is_some_and(|m| m.contains("index out of bounds"))
        );
        assert!(engine.is_valid_catalog(&catalog).await);

        let strict = Engine::builder()
            .validators(vec![])
            .with_validator(Box::new(Panicking))
            .strict(true)
            .build_with_client(MockHead)?;
        assert!(!strict.is_valid_catalog(&catalog).await);
        Ok(())
    }

    #[tokio::test]
    async fn list_format_and_only_errors() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut catalog = catalog();
        catalog["dataset"][1]["superTheme"] = json!([]);

        let output = engine
            .validate_catalog(&catalog, ResponseFormat::List, true, None)
            .await?;
        let Some(ValidationOutput::List(rows)) = output else {
            anyhow::bail!("expected list output");
        };
        assert_eq!(rows.catalog.len(), 1);
        assert_eq!(rows.catalog[0].status, Status::Ok);
        assert_eq!(rows.dataset.len(), 1);
        assert_eq!(rows.dataset[0].list_index, 1);
        assert_eq!(rows.dataset[0].error_location.as_deref(), Some("superTheme"));

        let output = engine
            .validate_catalog(&catalog, ResponseFormat::Dict, false, None)
            .await?;
        let Some(ValidationOutput::Dict(report)) = output else {
            anyhow::bail!("expected dict output");
        };
        assert_eq!(report.error.dataset.map(|d| d.len()), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn export_writes_table_and_returns_nothing() -> anyhow::Result<()> {
        let engine = engine()?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.csv");

        let output = engine
            .validate_catalog(&catalog(), ResponseFormat::Dict, false, Some(&path))
            .await?;
        assert!(output.is_none());
        assert!(std::fs::read_to_string(&path)?.starts_with("level,"));

        let txt = dir.path().join("x.txt");
        let err = engine
            .validate_catalog(&catalog(), ResponseFormat::Dict, false, Some(&txt))
            .await
            .expect_err("txt is not a table");
        assert!(matches!(err, EngineError::Table(_)));
        Ok(())
    }

    #[tokio::test]
    async fn schema_file_path_without_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("strict.json"),
            r#"{"type": "object", "required": ["title"]}"#,
        )?;
        let engine = Engine::builder()
            .schema_file(dir.path().join("strict.json").display().to_string())
            .validators(vec![])
            .build_with_client(MockHead)?;
        assert!(engine.is_valid_catalog(&json!({"title": "x"})).await);
        assert!(!engine.is_valid_catalog(&json!({})).await);
        Ok(())
    }

    #[test]
    fn from_config_applies_settings() -> anyhow::Result<()> {
        let config = Config {
            check_urls: Some(true),
            strict: Some(true),
            ..Config::default()
        };
        let engine = EngineBuilder::from_config(&config).build_with_client(MockHead)?;
        assert!(engine.strict);
        let expected: Vec<&str> = [ValidatorKind::DEFAULTS, ValidatorKind::LINK_CHECKS]
            .concat()
            .into_iter()
            .map(ValidatorKind::name)
            .collect();
        assert_eq!(engine.validator_names().collect::<Vec<_>>(), expected);
        Ok(())
    }
}
