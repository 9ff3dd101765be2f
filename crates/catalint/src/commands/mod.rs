pub mod config_schema;
pub mod validate;
