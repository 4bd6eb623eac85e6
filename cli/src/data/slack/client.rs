//! Chat API trait boundary and the rate-limited wrapper
//!
//! `ChatApi` is the narrow capability set the ingestion path depends on
//! (`history`, `replies`, `user`); tests supply scripted fakes.
//! `RateLimitedClient` wraps any implementation with the shared token
//! bucket, the bounded in-flight gate, and cancellation propagation. The
//! wrapper never retries; callers own that decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::limiter::TokenBucket;
use super::types::RawMessage;
use crate::data::error::DataError;
use crate::data::types::UserRecord;

/// One page of channel history or thread replies
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub messages: Vec<RawMessage>,
    pub next_cursor: Option<String>,
}

/// Which credential the client was constructed with. Observable for
/// logging only; behavior does not differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    User,
    Bot,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::User => write!(f, "user"),
            TokenKind::Bot => write!(f, "bot"),
        }
    }
}

/// Narrow capability set of the chat workspace API
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// One page of channel history inside `[oldest, latest]`
    async fn history(
        &self,
        channel_id: &str,
        oldest: DateTime<Utc>,
        latest: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, DataError>;

    /// One page of a thread's replies (first row duplicates the parent)
    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, DataError>;

    /// Single user lookup
    async fn user(&self, user_id: &str) -> Result<UserRecord, DataError>;
}

/// Wraps a `ChatApi` with the token bucket and in-flight gate.
///
/// Every outgoing call first takes a bucket token, then a semaphore permit,
/// then runs the inner call; the cancellation token short-circuits all
/// three stages.
pub struct RateLimitedClient<C> {
    inner: C,
    bucket: TokenBucket,
    gate: Semaphore,
    cancel: CancellationToken,
}

impl<C: ChatApi> RateLimitedClient<C> {
    pub fn new(inner: C, rate: f64, burst: f64, max_in_flight: usize, cancel: CancellationToken) -> Self {
        Self {
            inner,
            bucket: TokenBucket::new(rate, burst),
            gate: Semaphore::new(max_in_flight),
            cancel,
        }
    }

    async fn throttled<T, F>(&self, fut: F) -> Result<T, DataError>
    where
        F: Future<Output = Result<T, DataError>>,
    {
        self.bucket.acquire(&self.cancel).await?;
        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return Err(DataError::Cancelled),
            permit = self.gate.acquire() => {
                permit.map_err(|_| DataError::Cancelled)?
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DataError::Cancelled),
            result = fut => result,
        }
    }
}

#[async_trait]
impl<C: ChatApi> ChatApi for RateLimitedClient<C> {
    async fn history(
        &self,
        channel_id: &str,
        oldest: DateTime<Utc>,
        latest: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, DataError> {
        self.throttled(self.inner.history(channel_id, oldest, latest, cursor))
            .await
    }

    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, DataError> {
        self.throttled(self.inner.replies(channel_id, thread_ts, cursor))
            .await
    }

    async fn user(&self, user_id: &str) -> Result<UserRecord, DataError> {
        self.throttled(self.inner.user(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fake that tracks current and peak concurrency
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatApi for Arc<ConcurrencyProbe> {
        async fn history(
            &self,
            _channel_id: &str,
            _oldest: DateTime<Utc>,
            _latest: DateTime<Utc>,
            _cursor: Option<&str>,
        ) -> Result<HistoryPage, DataError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(HistoryPage {
                messages: vec![],
                next_cursor: None,
            })
        }

        async fn replies(
            &self,
            _channel_id: &str,
            _thread_ts: &str,
            _cursor: Option<&str>,
        ) -> Result<HistoryPage, DataError> {
            Ok(HistoryPage {
                messages: vec![],
                next_cursor: None,
            })
        }

        async fn user(&self, user_id: &str) -> Result<UserRecord, DataError> {
            Ok(UserRecord {
                user_id: user_id.to_string(),
                name: None,
                real_name: None,
                display_name: None,
                email: None,
                is_bot: false,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_capped() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let client = Arc::new(RateLimitedClient::new(
            Arc::clone(&probe),
            1000.0,
            1000.0,
            10,
            CancellationToken::new(),
        ));

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .history("C1", DateTime::UNIX_EPOCH, Utc::now(), None)
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(probe.peak.load(Ordering::SeqCst) <= 10);
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let cancel = CancellationToken::new();
        let client = RateLimitedClient::new(Arc::clone(&probe), 20.0, 50.0, 10, cancel.clone());

        cancel.cancel();
        let err = client.user("U1").await.unwrap_err();
        assert!(matches!(err, DataError::Cancelled));
    }
}
