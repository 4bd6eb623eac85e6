//! Workspace user record

use serde::{Deserialize, Serialize};

/// A workspace user, accumulated in the process-wide cache during a run and
/// flushed once to the users table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_bot: bool,
}
