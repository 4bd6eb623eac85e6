//! Channel reference and partition alias

use serde::{Deserialize, Serialize};

/// A chat channel targeted for ingestion or reading.
///
/// `name` is user-supplied (CLI or config file); when a caller uses only an
/// id, the partition alias is synthesized as `channel_<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    pub name: Option<String>,
}

impl ChannelRef {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// The string used in the `channel=` partition segment
    pub fn alias(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("channel_{}", self.id),
        }
    }

    /// Resolve a CLI argument against configured channels: match by id or by
    /// name, else treat the argument as a bare id.
    pub fn resolve(arg: &str, configured: &[ChannelRef]) -> Self {
        configured
            .iter()
            .find(|c| c.id == arg || c.name.as_deref() == Some(arg))
            .cloned()
            .unwrap_or_else(|| Self::new(arg, None))
    }
}
