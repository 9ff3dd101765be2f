use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of an instance location: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Build a `Vec<PathSegment>` from a mix of keys and indices.
///
/// ```
/// use catalint_report::{path, PathSegment};
///
/// let p = path!["dataset", 0, "title"];
/// assert_eq!(p[1], PathSegment::Index(0));
/// ```
#[macro_export]
macro_rules! path {
    ($($seg:expr),* $(,)?) => {
        vec![$($crate::PathSegment::from($seg)),*]
    };
}

/// An error as produced by a validator, before it is classified.
///
/// Both the JSON Schema layer and the custom validators emit this shape; the
/// [`ReportBuilder`](crate::ReportBuilder) turns it into a [`ValidationError`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawError {
    /// Failing keyword (`required`, `format`, `anyOf`, `brokenLink`, ...).
    pub validator: String,
    pub message: String,
    /// The constraint that was violated.
    pub validator_value: Value,
    /// Location of the offending node, from the catalog root.
    pub path: Vec<PathSegment>,
    /// The offending value, `Null` when there is none.
    pub instance: Value,
}

/// `1` when a required property is missing, `2` when a value is present but
/// malformed or inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ErrorCode {
    MissingRequired,
    Malformed,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::MissingRequired => 1,
            ErrorCode::Malformed => 2,
        }
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::MissingRequired),
            2 => Ok(Self::Malformed),
            other => Err(format!("unknown error code {other}, expected 1 or 2")),
        }
    }
}

/// A classified error, as it appears in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub validator: String,
    pub message: String,
    pub validator_value: Value,
    pub path: Vec<PathSegment>,
    pub instance: Value,
    pub error_code: ErrorCode,
}

impl ValidationError {
    /// Index of the dataset this error belongs to, if its path starts with
    /// `dataset/<index>`.
    pub fn dataset_index(&self) -> Option<usize> {
        match self.path.as_slice() {
            [PathSegment::Key(head), PathSegment::Index(i), ..] if head == "dataset" => Some(*i),
            _ => None,
        }
    }
}

impl From<RawError> for ValidationError {
    fn from(raw: RawError) -> Self {
        let error_code = if raw.validator == "required" {
            ErrorCode::MissingRequired
        } else {
            ErrorCode::Malformed
        };
        // A missing key has no offending instance.
        let instance = match error_code {
            ErrorCode::MissingRequired => Value::Null,
            ErrorCode::Malformed => raw.instance,
        };
        Self {
            validator: raw.validator,
            message: raw.message,
            validator_value: raw.validator_value,
            path: raw.path,
            instance,
            error_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(validator: &str, path: Vec<PathSegment>) -> RawError {
        RawError {
            validator: validator.to_string(),
            message: "msg".to_string(),
            validator_value: json!(["title"]),
            path,
            instance: json!({"title": "x"}),
        }
    }

    #[test]
    fn required_is_code_one_without_instance() {
        let err = ValidationError::from(raw("required", path![]));
        assert_eq!(err.error_code, ErrorCode::MissingRequired);
        assert_eq!(err.instance, Value::Null);
    }

    #[test]
    fn other_keywords_are_code_two_and_keep_instance() {
        let err = ValidationError::from(raw("format", path!["dataset", 0, "issued"]));
        assert_eq!(err.error_code, ErrorCode::Malformed);
        assert_eq!(err.instance, json!({"title": "x"}));
    }

    #[test]
    fn dataset_index_requires_index_segment() {
        let err = ValidationError::from(raw("type", path!["dataset", 3, "distribution"]));
        assert_eq!(err.dataset_index(), Some(3));

        let err = ValidationError::from(raw("type", path!["dataset"]));
        assert_eq!(err.dataset_index(), None);

        let err = ValidationError::from(raw("repeatedValue", path!["catalog", "dataset"]));
        assert_eq!(err.dataset_index(), None);
    }

    #[test]
    fn error_code_serializes_as_number() -> anyhow::Result<()> {
        let err = ValidationError::from(raw("required", path!["dataset", 1]));
        let value = serde_json::to_value(&err)?;
        assert_eq!(value["error_code"], json!(1));
        assert_eq!(value["path"], json!(["dataset", 1]));
        Ok(())
    }

    #[test]
    fn error_code_rejects_unknown_numbers() {
        assert!(ErrorCode::try_from(3).is_err());
    }
}
