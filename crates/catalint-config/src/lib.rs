#![doc = include_str!("../README.md")]

use core::time::Duration;
use std::path::{Path, PathBuf};

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CONFIG_FILENAME: &str = "catalint.toml";

fn example_validators() -> Vec<ValidatorKind> {
    vec![
        ValidatorKind::ThemeIdsNotRepeated,
        ValidatorKind::ConsistentDistributionFields,
        ValidatorKind::LandingPages,
    ]
}

fn example_schema_dir() -> PathBuf {
    PathBuf::from("schemas")
}

/// A custom (non-schema) check that can be enabled for a validation pass.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::VariantArray,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ValidatorKind {
    /// Every `id` in `themeTaxonomy` is unique.
    ThemeIdsNotRepeated,
    /// Every dataset `identifier` is unique.
    DatasetIdsNotRepeated,
    /// A distribution's `format` agrees with the extension of its
    /// `downloadURL` and `fileName`.
    ConsistentDistributionFields,
    /// Every distribution `accessURL` and `downloadURL` answers a HEAD request.
    DistributionUrls,
    /// Every dataset `landingPage` answers a HEAD request.
    LandingPages,
    /// Every distribution `downloadURL` answers a HEAD request.
    DistributionDownloadUrls,
}

impl ValidatorKind {
    /// Checks enabled when nothing is configured.
    pub const DEFAULTS: &'static [Self] = &[
        Self::ThemeIdsNotRepeated,
        Self::DatasetIdsNotRepeated,
        Self::ConsistentDistributionFields,
    ];

    /// Checks added on top of the defaults when broken-link checking is on.
    pub const LINK_CHECKS: &'static [Self] = &[Self::LandingPages, Self::DistributionUrls];

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// The checks to run: `explicit` when given, otherwise the defaults plus
    /// the link checks when `check_urls` is on.
    pub fn enabled(explicit: Option<&[Self]>, check_urls: bool) -> Vec<Self> {
        if let Some(kinds) = explicit {
            return kinds.to_vec();
        }
        let mut kinds = Self::DEFAULTS.to_vec();
        if check_urls {
            kinds.extend_from_slice(Self::LINK_CHECKS);
        }
        kinds
    }
}

/// Where the structural JSON Schema is loaded from.
#[derive(Debug, Default, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(title = "Schema")]
pub struct SchemaConfig {
    /// Directory holding the master schema and every schema it references.
    ///
    /// Relative paths are resolved against the directory containing
    /// `catalint.toml`. When omitted, the schemas bundled with Catalint are
    /// used.
    #[schemars(title = "Schema Directory", example = example_schema_dir())]
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// File name of the master schema inside `dir`. Defaults to
    /// `catalog.json`. Without `dir` this is a path to the master schema,
    /// resolved against the directory containing `catalint.toml`, and its
    /// siblings are loaded with it.
    #[schemars(title = "Master Schema File")]
    #[serde(default)]
    pub file: Option<String>,
}

/// Settings for the checks that request URLs with HTTP HEAD requests.
#[derive(Debug, Default, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
#[schemars(title = "URL Check")]
pub struct UrlCheckConfig {
    /// Verify TLS certificates. Defaults to `true`.
    #[serde(default)]
    pub verify_tls: Option<bool>,

    /// Per-request timeout in seconds. A request that takes longer is
    /// reported with status code 408. Defaults to 1 second.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,

    /// Maximum number of requests in flight. Defaults to 10.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl UrlCheckConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Configuration file for the Catalint catalog validator.
///
/// Catalint walks up the directory tree from the working directory looking
/// for `catalint.toml` files and merges them. Settings in child directories
/// take priority over parent directories. Set `root = true` to stop the upward
/// search.
#[derive(Debug, Default, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
#[schemars(title = "catalint.toml")]
pub struct Config {
    /// Mark this configuration file as the project root.
    #[serde(default)]
    pub root: bool,

    /// Custom checks to run, in order. When omitted, the duplicate-id and
    /// format/extension checks run, plus the link checks if `check-urls` is
    /// set.
    #[schemars(title = "Validators", example = example_validators())]
    #[serde(default)]
    pub validators: Option<Vec<ValidatorKind>>,

    /// Add the landing page and distribution URL checks to the default set.
    /// Ignored when `validators` is given explicitly.
    #[serde(default)]
    pub check_urls: Option<bool>,

    /// Treat a custom check that fails to run as making the catalog invalid.
    #[serde(default)]
    pub strict: Option<bool>,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub url_check: UrlCheckConfig,
}

impl Config {
    /// Merge a parent config into this one. Values set in the child win;
    /// `root` is not inherited.
    fn merge_parent(&mut self, parent: Config) {
        self.validators = self.validators.take().or(parent.validators);
        self.check_urls = self.check_urls.or(parent.check_urls);
        self.strict = self.strict.or(parent.strict);
        // `[schema]` is inherited as a whole: a child `file` may be a path
        // that only makes sense without the parent's `dir`
        if self.schema.dir.is_none() && self.schema.file.is_none() {
            self.schema = parent.schema;
        }
        let url = &mut self.url_check;
        url.verify_tls = url.verify_tls.or(parent.url_check.verify_tls);
        url.timeout_seconds = url.timeout_seconds.or(parent.url_check.timeout_seconds);
        url.workers = url.workers.or(parent.url_check.workers);
    }

    fn check(&self, path: &Path) -> Result<(), anyhow::Error> {
        if let Some(secs) = self.url_check.timeout_seconds
            && !(secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok())
        {
            anyhow::bail!(
                "{}: url-check.timeout-seconds must be a positive number, got {secs}",
                path.display()
            );
        }
        if self.url_check.workers == Some(0) {
            anyhow::bail!("{}: url-check.workers must be at least 1", path.display());
        }
        Ok(())
    }

    /// Resolve a relative `schema.dir`, or a relative `schema.file` given
    /// without a dir, against the directory of the file it was read from.
    fn anchor(&mut self, config_dir: &Path) {
        match (self.schema.dir.as_mut(), self.schema.file.as_mut()) {
            (Some(dir), _) if dir.is_relative() => *dir = config_dir.join(&*dir),
            (None, Some(file)) if Path::new(file.as_str()).is_relative() => {
                *file = config_dir.join(&*file).to_string_lossy().into_owned();
            }
            _ => {}
        }
    }
}

/// Generate the JSON Schema for `catalint.toml` as a `serde_json::Value`.
///
/// # Panics
///
/// Panics if the schema cannot be serialized to JSON (should never happen).
pub fn schema() -> Value {
    serde_json::to_value(schema_for!(Config)).expect("schema serialization cannot fail")
}

/// Read and check a single `catalint.toml`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, has unknown
/// keys, or holds out-of-range values.
pub fn load_file(path: &Path) -> Result<Config, anyhow::Error> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let mut cfg: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
    cfg.check(path)?;
    if let Some(dir) = path.parent() {
        cfg.anchor(dir);
    }
    Ok(cfg)
}

/// Search for `catalint.toml` files starting from `start_dir`, walking up.
/// Merges all configs found until one with `root = true` is hit (inclusive).
/// Returns the merged config, or `None` if no config file was found.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn find_and_load(start_dir: &Path) -> Result<Option<Config>, anyhow::Error> {
    let mut configs: Vec<Config> = Vec::new();
    let mut dir = start_dir.to_path_buf();

    loop {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.is_file() {
            let cfg = load_file(&candidate)?;
            let is_root = cfg.root;
            configs.push(cfg);
            if is_root {
                break;
            }
        }
        if !dir.pop() {
            break;
        }
    }

    // configs[0] is the closest (child), last is the farthest (root-most parent)
    let mut iter = configs.into_iter();
    let Some(mut merged) = iter.next() else {
        return Ok(None);
    };
    for parent in iter {
        merged.merge_parent(parent);
    }
    Ok(Some(merged))
}

/// Load config from the current working directory (walking upward).
///
/// # Errors
///
/// Returns an error if the working directory is unavailable or a config file
/// cannot be read or parsed.
pub fn load() -> Result<Config, anyhow::Error> {
    let cwd = std::env::current_dir()?;
    Ok(find_and_load(&cwd)?.unwrap_or_default())
}
