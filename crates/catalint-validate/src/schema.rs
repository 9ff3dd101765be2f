//! JSON Schema layer: loading a schema set and turning `jsonschema` errors
//! into [`RawError`]s.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use std::path::{Path, PathBuf};

use jsonschema::{Draft, Validator};
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use catalint_report::{PathSegment, RawError};

/// Name of the master schema, both bundled and by default in a schema directory.
pub const DEFAULT_SCHEMA_FILE: &str = "catalog.json";

const BUILTIN_BASE: &str = "https://schemas.catalint.invalid/";

const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    ("catalog.json", include_str!("../schemas/catalog.json")),
    ("dataset.json", include_str!("../schemas/dataset.json")),
    ("distribution.json", include_str!("../schemas/distribution.json")),
    ("field.json", include_str!("../schemas/field.json")),
    ("theme.json", include_str!("../schemas/theme.json")),
    ("agent.json", include_str!("../schemas/agent.json")),
    ("common.json", include_str!("../schemas/common.json")),
];

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("schema directory {} is not usable", path.display())]
    #[diagnostic(code(catalint::schema::dir))]
    InvalidDir { path: PathBuf },

    #[error("failed to read schema {}", path.display())]
    #[diagnostic(code(catalint::schema::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema {name} is not valid JSON")]
    #[diagnostic(code(catalint::schema::parse))]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("master schema {file} not found in {dir}")]
    #[diagnostic(
        code(catalint::schema::missing),
        help("the master schema must be one of the *.json files in the schema directory")
    )]
    MissingMaster { file: String, dir: String },

    #[error("failed to compile schema {file}: {message}")]
    #[diagnostic(code(catalint::schema::compile))]
    Compile { file: String, message: String },
}

/// Schema documents keyed by their URL (without fragment).
type Documents = Arc<BTreeMap<String, Value>>;

/// Serves `$ref` targets from the loaded documents only, so a reference
/// outside the set fails at compile time instead of reaching the network.
struct DocumentRetriever {
    documents: Documents,
}

impl jsonschema::Retrieve for DocumentRetriever {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<String>,
    ) -> Result<Value, Box<dyn core::error::Error + Send + Sync>> {
        let key = strip_fragment(uri.as_str());
        self.documents
            .get(key)
            .cloned()
            .ok_or_else(|| format!("schema {key} is not part of the schema set").into())
    }
}

fn strip_fragment(uri: &str) -> &str {
    uri.split_once('#').map_or(uri, |(base, _)| base)
}

/// A compiled master schema plus the documents it was compiled from.
pub struct SchemaValidator {
    validator: Validator,
    documents: Documents,
    master_url: String,
}

impl core::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("master_url", &self.master_url)
            .field("documents", &self.documents.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile the bundled catalog schemas.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled schemas themselves are broken.
    pub fn builtin() -> Result<Self, SchemaError> {
        let mut documents = BTreeMap::new();
        for (name, content) in BUILTIN_SCHEMAS {
            let value = serde_json::from_str(content).map_err(|source| SchemaError::Parse {
                name: (*name).to_string(),
                source,
            })?;
            documents.insert(format!("{BUILTIN_BASE}{name}"), value);
        }
        Self::compile(documents, &format!("{BUILTIN_BASE}{DEFAULT_SCHEMA_FILE}"))
    }

    /// Load every `*.json` file in `schema_dir` and compile `schema_file` as
    /// the master schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the directory cannot be read, a file is
    /// not valid JSON, the master file is missing, or a `$ref` cannot be
    /// resolved within the directory.
    #[tracing::instrument(skip_all, fields(dir = %schema_dir.display(), file = schema_file))]
    pub fn from_dir(schema_file: &str, schema_dir: &Path) -> Result<Self, SchemaError> {
        let invalid_dir = || SchemaError::InvalidDir {
            path: schema_dir.to_path_buf(),
        };
        let absolute = std::path::absolute(schema_dir).map_err(|_| invalid_dir())?;
        let base = Url::from_directory_path(&absolute).map_err(|()| invalid_dir())?;

        let entries = std::fs::read_dir(&absolute).map_err(|source| SchemaError::Io {
            path: absolute.clone(),
            source,
        })?;
        let mut documents = BTreeMap::new();
        for entry in entries {
            let path = entry
                .map_err(|source| SchemaError::Io {
                    path: absolute.clone(),
                    source,
                })?
                .path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path).map_err(|source| SchemaError::Io {
                path: path.clone(),
                source,
            })?;
            let value = serde_json::from_str(&content).map_err(|source| SchemaError::Parse {
                name: name.to_string(),
                source,
            })?;
            let url = base.join(name).map_err(|_| invalid_dir())?;
            documents.insert(url.to_string(), value);
        }
        tracing::debug!(count = documents.len(), "loaded schema documents");

        let master = base.join(schema_file).map_err(|_| invalid_dir())?;
        if !documents.contains_key(master.as_str()) {
            return Err(SchemaError::MissingMaster {
                file: schema_file.to_string(),
                dir: absolute.display().to_string(),
            });
        }
        Self::compile(documents, master.as_str())
    }

    fn compile(documents: BTreeMap<String, Value>, master_url: &str) -> Result<Self, SchemaError> {
        let documents = Arc::new(documents);
        let compile_error = |message: String| SchemaError::Compile {
            file: master_url.to_string(),
            message,
        };
        let master = documents
            .get(master_url)
            .ok_or_else(|| compile_error("master schema not loaded".to_string()))?;

        let validator = jsonschema::options()
            .with_draft(Draft::Draft4)
            .with_base_uri(master_url.to_string())
            .with_retriever(DocumentRetriever {
                documents: Arc::clone(&documents),
            })
            .should_validate_formats(true)
            .build(master)
            .map_err(|e| compile_error(e.to_string()))?;

        Ok(Self {
            validator,
            documents,
            master_url: master_url.to_string(),
        })
    }

    pub fn is_valid(&self, catalog: &Value) -> bool {
        self.validator.is_valid(catalog)
    }

    /// Every schema violation of `catalog`. Each call re-validates.
    pub fn iter_errors<'a>(&'a self, catalog: &'a Value) -> impl Iterator<Item = RawError> + 'a {
        self.validator.iter_errors(catalog).map(move |error| {
            let instance_pointer = error.instance_path().to_string();
            // the schema path is relative to the document a `$ref` landed in,
            // the evaluation path starts at the master and keeps every hop
            let evaluation_segments = pointer_segments(&error.evaluation_path().to_string());
            let schema_segments = pointer_segments(&error.schema_path().to_string());
            RawError {
                validator: keyword(&schema_segments),
                message: clean_error_message(error.to_string()),
                validator_value: self.keyword_value(&evaluation_segments),
                path: instance_path(catalog, &instance_pointer),
                instance: catalog.pointer(&instance_pointer).cloned().unwrap_or(Value::Null),
            }
        })
    }

    /// Follow an evaluation path from the master schema, hopping across
    /// `$ref`s, and return the value found there.
    fn keyword_value(&self, segments: &[String]) -> Value {
        let mut doc_url = self.master_url.clone();
        let Some(mut node) = self.documents.get(&doc_url) else {
            return Value::Null;
        };
        for segment in segments {
            if segment == "$ref" {
                match self.follow_ref(&doc_url, node) {
                    Some((url, target)) => {
                        doc_url = url;
                        node = target;
                    }
                    None => return Value::Null,
                }
                continue;
            }
            let child = match node {
                Value::Object(map) => map.get(segment.as_str()),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match child {
                Some(child) => node = child,
                None => {
                    // Some locations skip the `$ref` hop.
                    let Some((url, target)) = self.follow_ref(&doc_url, node) else {
                        return Value::Null;
                    };
                    let Some(child) = target.get(segment.as_str()) else {
                        return Value::Null;
                    };
                    doc_url = url;
                    node = child;
                }
            }
        }
        node.clone()
    }

    fn follow_ref<'a>(&'a self, doc_url: &str, node: &Value) -> Option<(String, &'a Value)> {
        let reference = node.get("$ref")?.as_str()?;
        let resolved = Url::parse(doc_url).ok()?.join(reference).ok()?;
        let fragment = resolved.fragment().unwrap_or_default().to_string();
        let url = strip_fragment(resolved.as_str()).to_string();
        let document = self.documents.get(&url)?;
        let target = if fragment.is_empty() {
            document
        } else {
            let decoded = percent_encoding::percent_decode_str(&fragment).decode_utf8_lossy();
            document.pointer(&decoded)?
        };
        Some((url, target))
    }
}

/// Split a JSON pointer into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .trim_start_matches('/')
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// The failing keyword: last non-numeric segment of the schema location.
fn keyword(schema_segments: &[String]) -> String {
    schema_segments
        .iter()
        .rev()
        .find(|s| s.parse::<usize>().is_err())
        .cloned()
        .unwrap_or_default()
}

/// Convert an instance pointer into path segments, treating a numeric
/// segment as an index only where the parent is an array.
fn instance_path(catalog: &Value, pointer: &str) -> Vec<PathSegment> {
    let mut current = Some(catalog);
    pointer_segments(pointer)
        .into_iter()
        .map(|segment| {
            let index = match current {
                Some(Value::Array(_)) => segment.parse::<usize>().ok(),
                _ => None,
            };
            if let Some(index) = index {
                current = current.and_then(|v| v.get(index));
                PathSegment::Index(index)
            } else {
                current = current.and_then(|v| v.get(segment.as_str()));
                PathSegment::Key(segment)
            }
        })
        .collect()
}

/// Clean up error messages from the `jsonschema` crate.
///
/// For `anyOf`/`oneOf` failures the crate dumps the whole offending value
/// into the message. The report already carries the instance, so only the
/// `"not valid under any of the schemas listed in the '...' keyword"` part
/// is kept. All other messages are returned unchanged.
fn clean_error_message(msg: String) -> String {
    const MARKER: &str = " is not valid under any of the schemas listed in the '";
    if let Some(pos) = msg.find(MARKER) {
        // skip " is "
        return msg[pos + 4..].to_string();
    }
    msg
}
