//! Read path: thread reconstruction and view rendering

pub mod format;
pub mod reconstruct;

pub use format::{ViewContext, format_view};
pub use reconstruct::{ThreadNode, flatten, reconstruct};
