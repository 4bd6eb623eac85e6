//! Chat workspace API: trait boundary, wire types, transport, rate limiting

pub mod client;
pub mod http;
pub mod limiter;
pub mod types;

pub use client::{ChatApi, HistoryPage, RateLimitedClient, TokenKind};
pub use http::SlackHttpClient;
pub use limiter::TokenBucket;
