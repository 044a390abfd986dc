//! Short-lived response cache shared by concurrent viewers.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Holds the last value of one query for `ttl`.
///
/// The lock is held while refreshing, so concurrent misses wait for the
/// one in flight instead of each going upstream.
pub struct ResponseCache<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value, or run `refresh` and cache its result.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((stored_at, value)) = slot.as_ref() {
            if stored_at.elapsed() < self.ttl {
                return value.clone();
            }
        }

        let value = refresh().await;
        *slot = Some((Instant::now(), value.clone()));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_misses_share_one_refresh() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(5)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        calls.fetch_add(1, Ordering::SeqCst) + 1
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_value_is_refreshed() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        assert_eq!(cache.get_or_refresh(|| async { 1 }).await, 1);
        assert_eq!(cache.get_or_refresh(|| async { 2 }).await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get_or_refresh(|| async { 3 }).await, 3);
    }

    #[test]
    fn test_zero_ttl_never_serves_cached() {
        let uncached = ResponseCache::new(Duration::ZERO);
        tokio_test::block_on(uncached.get_or_refresh(|| async { 'a' }));
        assert_eq!(tokio_test::block_on(uncached.get_or_refresh(|| async { 'b' })), 'b');
    }
}
