#![doc = include_str!("../README.md")]

pub mod builder;
pub mod error;
pub mod report;

pub use builder::{ReportBuilder, build_report};
pub use error::{ErrorCode, PathSegment, RawError, ValidationError};
pub use report::{
    CatalogEntry, DatasetEntry, ReportBody, RunStatus, Status, ValidationReport, ValidatorRun,
    value_text,
};
