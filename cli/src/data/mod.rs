//! Data layer: entity types, external API clients, columnar storage,
//! analytical query engine

pub mod duckdb;
pub mod error;
pub mod jira;
pub mod parquet;
pub mod slack;
pub mod types;

pub use error::DataError;
pub use parquet::{DatasetLayout, DatasetReader, DatasetWriter};
