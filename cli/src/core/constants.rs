// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "threadvault";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "threadvault.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "THREADVAULT_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "THREADVAULT_LOG";

/// Environment variable for the dataset root directory
pub const ENV_CACHE_PATH: &str = "THREADVAULT_CACHE_PATH";

/// Default dataset root directory
pub const DEFAULT_CACHE_DIR: &str = "chat_cache";

// =============================================================================
// Environment Variables - Credentials
// =============================================================================

/// Chat workspace user token (takes precedence over the bot token)
pub const ENV_USER_TOKEN: &str = "USER_TOKEN";

/// Chat workspace bot token (fallback credential)
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";

/// Issue-tracker user for basic auth
pub const ENV_ISSUE_USER: &str = "ISSUE_USER";

/// Issue-tracker API token
pub const ENV_ISSUE_TOKEN: &str = "ISSUE_TOKEN";

/// Issue-tracker base URL
pub const ENV_ISSUE_SERVER: &str = "ISSUE_SERVER";

// =============================================================================
// Chat API
// =============================================================================

/// Chat Web API base URL
pub const CHAT_API_BASE_URL: &str = "https://slack.com/api";

/// Token bucket refill rate (tokens per second), shared across all methods
pub const RATE_LIMIT_PER_SEC: f64 = 20.0;

/// Token bucket burst capacity
pub const RATE_LIMIT_BURST: f64 = 50.0;

/// Maximum simultaneous in-flight requests (semaphore width)
pub const MAX_IN_FLIGHT: usize = 10;

/// Per-request HTTP timeout in seconds
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Page size for history and replies pagination
pub const HISTORY_PAGE_LIMIT: u32 = 200;

// =============================================================================
// Ingestion Defaults
// =============================================================================

/// Default lookback window in days when no window flags are given
pub const DEFAULT_WINDOW_DAYS: i64 = 1;

/// Bounded fan-out width for issue-ticket enrichment
pub const ENRICH_MAX_IN_FLIGHT: usize = 10;

// =============================================================================
// Dataset Layout
// =============================================================================

/// Entity directory for per-channel message partitions
pub const ENTITY_MESSAGES: &str = "messages";

/// Entity directory for issue-ticket partitions
pub const ENTITY_ISSUE_TICKETS: &str = "issue_tickets";

/// File name of the unpartitioned users table
pub const USERS_FILE_NAME: &str = "users.parquet";

/// File name of every partition leaf
pub const PARTITION_FILE_NAME: &str = "data.parquet";

// =============================================================================
// Exit Codes
// =============================================================================

/// User or configuration error
pub const EXIT_CONFIG: i32 = 1;

/// Runtime error
pub const EXIT_RUNTIME: i32 = 2;
