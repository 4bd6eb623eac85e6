//! Partitioned Parquet dataset: layout, schemas, writer, reader

pub mod layout;
pub mod reader;
pub mod schema;
pub mod writer;

pub use layout::{DatasetLayout, PartitionEntry};
pub use reader::{DatasetReader, PartitionInfo, PartitionStat};
pub use writer::DatasetWriter;
