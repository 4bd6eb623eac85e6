//! Process-lifetime user cache
//!
//! Concurrent map `user_id -> UserRecord` with single-flight semantics on
//! miss: concurrent lookups of the same unknown id coalesce into one remote
//! fetch, and every waiter receives the same result or the same (shared)
//! error. Entries are never evicted during a run. External readers get
//! snapshot copies, never the internal map.
//!
//! Modeled as an injected collaborator, not an ambient singleton, so tests
//! can supply deterministic substitutes.

use std::sync::Arc;

use moka::future::Cache;

use crate::data::error::DataError;
use crate::data::slack::ChatApi;
use crate::data::types::UserRecord;

/// Single-flight user cache backed by a moka future cache
pub struct UserCache {
    cache: Cache<String, UserRecord>,
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UserCache {
    /// Unbounded: entries live for the whole run
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Look up `user_id`, fetching through `api` on miss. Concurrent
    /// callers for the same unknown id share one underlying fetch; failed
    /// fetches are not cached, so a later call may retry.
    pub async fn get_or_fetch(
        &self,
        api: &dyn ChatApi,
        user_id: &str,
    ) -> Result<UserRecord, Arc<DataError>> {
        self.cache
            .try_get_with(user_id.to_string(), api.user(user_id))
            .await
    }

    /// Cached record, if any, without triggering a fetch
    pub async fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.cache.get(user_id).await
    }

    /// Whether the id is already cached
    pub fn contains(&self, user_id: &str) -> bool {
        self.cache.contains_key(user_id)
    }

    /// Insert a record directly (tests and pre-seeded runs)
    pub async fn prime(&self, user: UserRecord) {
        self.cache.insert(user.user_id.clone(), user).await;
    }

    /// Snapshot copy of every cached record, sorted by id
    pub async fn snapshot(&self) -> Vec<UserRecord> {
        self.cache.run_pending_tasks().await;
        let mut users: Vec<UserRecord> = self.cache.iter().map(|(_, v)| v).collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::data::slack::HistoryPage;

    /// Fake chat API with a slow user endpoint and a call counter
    struct SlowUserApi {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SlowUserApi {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl ChatApi for SlowUserApi {
        async fn history(
            &self,
            _channel_id: &str,
            _oldest: DateTime<Utc>,
            _latest: DateTime<Utc>,
            _cursor: Option<&str>,
        ) -> Result<HistoryPage, DataError> {
            unimplemented!("not used in cache tests")
        }

        async fn replies(
            &self,
            _channel_id: &str,
            _thread_ts: &str,
            _cursor: Option<&str>,
        ) -> Result<HistoryPage, DataError> {
            unimplemented!("not used in cache tests")
        }

        async fn user(&self, user_id: &str) -> Result<UserRecord, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.fail {
                return Err(DataError::not_found(format!("user={user_id}")));
            }
            Ok(UserRecord {
                user_id: user_id.to_string(),
                name: Some("alice".to_string()),
                real_name: Some("Alice Smith".to_string()),
                display_name: None,
                email: None,
                is_bot: false,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_coalesces_concurrent_misses() {
        let api = Arc::new(SlowUserApi::new(false));
        let cache = Arc::new(UserCache::new());

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let api = Arc::clone(&api);
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_fetch(api.as_ref(), "U1").await })
            })
            .collect();

        for task in tasks {
            let user = task.await.unwrap().unwrap();
            assert_eq!(user.user_id, "U1");
            assert_eq!(user.real_name.as_deref(), Some("Alice Smith"));
        }

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_the_same_error() {
        let api = Arc::new(SlowUserApi::new(true));
        let cache = Arc::new(UserCache::new());

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let api = Arc::clone(&api);
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_fetch(api.as_ref(), "U404").await })
            })
            .collect();

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert!(matches!(*err, DataError::NotFound { .. }));
        }
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hit_does_not_refetch() {
        let api = SlowUserApi::new(false);
        let cache = UserCache::new();

        cache.get_or_fetch(&api, "U1").await.unwrap();
        cache.get_or_fetch(&api, "U1").await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains("U1"));
        assert!(cache.get("U1").await.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted_copy() {
        let cache = UserCache::new();
        for id in ["U3", "U1", "U2"] {
            cache
                .prime(UserRecord {
                    user_id: id.to_string(),
                    name: None,
                    real_name: None,
                    display_name: None,
                    email: None,
                    is_bot: false,
                })
                .await;
        }
        let snapshot = cache.snapshot().await;
        let ids: Vec<&str> = snapshot.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["U1", "U2", "U3"]);
    }
}
