#![doc = include_str!("../README.md")]
#![allow(unused_assignments)] // thiserror/miette derive macros trigger false positives

pub mod list;
pub mod table;

use miette::Diagnostic;
use thiserror::Error;

pub use list::{CatalogRow, DatasetRow, ValidationRows, to_rows};
pub use table::{TableError, write_table};

/// Shape of the value returned by a validation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// The hierarchical report as-is.
    #[default]
    Dict,
    /// Flattened catalog and dataset rows.
    List,
}

#[derive(Debug, Error, Diagnostic)]
#[error("unknown output format '{0}', expected: dict, list")]
#[diagnostic(code(catalint::format))]
pub struct UnknownFormat(pub String);

impl core::str::FromStr for ResponseFormat {
    type Err = UnknownFormat;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dict" => Ok(Self::Dict),
            "list" => Ok(Self::List),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

impl core::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Dict => write!(f, "dict"),
            Self::List => write!(f, "list"),
        }
    }
}
