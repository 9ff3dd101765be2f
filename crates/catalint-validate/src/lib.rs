#![doc = include_str!("../README.md")]
#![allow(unused_assignments)] // thiserror/miette derive macros trigger false positives

extern crate alloc;

pub mod engine;
pub mod index;
pub mod schema;
pub mod url_check;
pub mod validators;

pub use catalint_config::ValidatorKind;
pub use engine::{Engine, EngineBuilder, EngineError, ValidationOutput, render};
pub use index::CatalogIndex;
pub use schema::{SchemaError, SchemaValidator};
pub use url_check::{HttpHead, ReqwestHead, UrlCheckOptions, UrlChecker, UrlStatus};
pub use validators::{CustomError, RunError, SimpleValidator};
