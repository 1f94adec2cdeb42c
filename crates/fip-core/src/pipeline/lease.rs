//! Per-thread ordering: no two pipeline jobs for the same thread may
//! run concurrently, so a burst of messages on one thread never races
//! two Updater calls against the same row.
//!
//! Same small `std::sync::Mutex`-guarded table of per-key state shape
//! as [`crate::llm::circuit`]'s breaker table, with no `parking_lot`
//! dependency pulled in for it. The inner per-thread lease is a
//! `tokio::sync::Mutex` since it is held across `.await` points.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// A keyed table of per-thread locks. Acquiring the lease for a thread
/// blocks only other callers contending for the *same* thread; distinct
/// threads process fully in parallel, up to the worker pool's size.
#[derive(Default)]
pub struct PerThreadLeases {
    table: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl PerThreadLeases {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lease for `thread_id`, waiting if another job for
    /// the same thread currently holds it. The returned guard releases
    /// the lease on drop.
    pub async fn acquire(&self, thread_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().expect("per-thread lease table poisoned");
            table
                .entry(thread_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of threads currently tracked in the table. Entries are
    /// never removed (a thread can always see another job again), so
    /// this grows to the count of distinct threads ever processed in
    /// this process's lifetime — bounded in practice by how many
    /// distinct threads a single worker fleet instance handles.
    pub fn tracked_thread_count(&self) -> usize {
        self.table.lock().expect("per-thread lease table poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn distinct_threads_do_not_contend() {
        let leases = Arc::new(PerThreadLeases::new());
        let a = leases.clone().acquire(1).await;
        let b = tokio::time::timeout(Duration::from_millis(200), leases.acquire(2)).await;
        assert!(b.is_ok());
        drop(a);
    }

    #[tokio::test]
    async fn same_thread_serializes_concurrent_acquires() {
        let leases = Arc::new(PerThreadLeases::new());
        let counter = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let leases = leases.clone();
            let counter = counter.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _guard = leases.acquire(42).await;
                let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tracked_thread_count_grows_per_distinct_thread() {
        let leases = PerThreadLeases::new();
        let _a = leases.acquire(1).await;
        drop(_a);
        let _b = leases.acquire(2).await;
        assert_eq!(leases.tracked_thread_count(), 2);
    }
}
