//! Chat workspace archive: rate-limited ingestion into a partitioned
//! Parquet dataset, thread reconstruction, and an embedded SQL read path.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
