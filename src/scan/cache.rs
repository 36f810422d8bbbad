//! Time-boxed snapshot cache with single-flight refresh.
//!
//! Readers inside the TTL window share one immutable snapshot. On a miss,
//! exactly one caller runs the refresh while the rest wait on the gate and
//! then pick up the snapshot it installed; refreshes are never run
//! redundantly in parallel.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

struct Snapshot<T> {
    data: Arc<Vec<T>>,
    taken_at: Instant,
}

pub struct SnapshotCache<T> {
    ttl: Duration,
    slot: RwLock<Option<Snapshot<T>>>,
    refresh_gate: Mutex<()>,
}

impl<T> SnapshotCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Read through the cache, invoking `refresh` only when the snapshot is
    /// missing or older than the TTL.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Arc<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        if let Some(data) = self.fresh().await {
            return data;
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while this one waited.
        if let Some(data) = self.fresh().await {
            return data;
        }

        let data = Arc::new(refresh().await);
        *self.slot.write().await = Some(Snapshot {
            data: data.clone(),
            taken_at: Instant::now(),
        });
        data
    }

    /// Drop the snapshot so the next read re-scans immediately.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Record count and age of the current snapshot, if one is live.
    pub async fn peek(&self) -> Option<(usize, Duration)> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .map(|s| (s.data.len(), s.taken_at.elapsed()))
    }

    async fn fresh(&self) -> Option<Arc<Vec<T>>> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(s) if s.taken_at.elapsed() < self.ttl => Some(s.data.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_snapshot_reused_within_ttl() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![1, 2, 3]
            })
            .await;
        let second = cache
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![9]
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first, vec![1, 2, 3]);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_ttl_expiry_triggers_refresh() {
        let cache = SnapshotCache::new(Duration::from_millis(10));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![1]
            })
            .await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        let data = cache
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![2]
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*data, vec![2]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rescan() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.get_or_refresh(|| async { vec![1] }).await;
        cache.invalidate().await;
        assert!(cache.peek().await.is_none());
        let data = cache.get_or_refresh(|| async { vec![2] }).await;
        assert_eq!(*data, vec![2]);
    }

    #[tokio::test]
    async fn test_single_flight_refresh() {
        // The original implementation let concurrent misses race and both
        // re-scan (last writer wins). This cache serializes them: the
        // second caller waits on the gate and reuses the winner's snapshot.
        let cache = Arc::new(SnapshotCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the refresh open long enough for the other
                        // tasks to pile up on the gate.
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        vec![42]
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(*handle.await.unwrap(), vec![42]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
