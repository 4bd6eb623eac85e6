//! Ingestion engine: fetch, cache, enrich, orchestrate

pub mod enrich;
pub mod fetcher;
pub mod pipeline;
pub mod users;

pub use enrich::{EnrichReport, EnrichmentCoordinator};
pub use fetcher::{FetchReport, MessageFetcher};
pub use pipeline::{IngestPipeline, RunSummary};
pub use users::UserCache;
