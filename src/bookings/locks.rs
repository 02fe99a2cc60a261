//! Per-date booking locks
//!
//! Capacity checks and the writes that depend on them run while holding the
//! lock of every calendar date the booking can touch. Locks are always taken
//! in ascending date order.

use std::sync::{Arc, Mutex, PoisonError};

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of async locks keyed by calendar date.
#[derive(Debug, Default)]
pub struct DateLocks {
    locks: Mutex<FxHashMap<Date, Arc<AsyncMutex<()>>>>,
}

/// Held date locks; released on drop.
#[derive(Debug)]
pub struct DateGuards {
    dates: Vec<Date>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl DateGuards {
    /// The dates held, ascending.
    #[must_use]
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }
}

impl DateLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the locks for `dates`, waiting for any current holders.
    pub async fn lock(&self, dates: impl IntoIterator<Item = Date>) -> DateGuards {
        let mut dates: Vec<Date> = dates.into_iter().collect();

        dates.sort_unstable();
        dates.dedup();

        let handles: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

            // Drop entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);

            dates
                .iter()
                .map(|date| Arc::clone(locks.entry(*date).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());

        for handle in handles {
            guards.push(handle.lock_owned().await);
        }

        DateGuards {
            dates,
            _guards: guards,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jiff::civil::date;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn guards_are_sorted_and_deduplicated() {
        let locks = DateLocks::new();

        let guards = locks
            .lock([date(2026, 7, 2), date(2026, 7, 1), date(2026, 7, 2)])
            .await;

        assert_eq!(guards.dates(), &[date(2026, 7, 1), date(2026, 7, 2)]);
    }

    #[tokio::test]
    async fn overlapping_dates_wait_for_release() {
        let locks = Arc::new(DateLocks::new());
        let held = locks.lock([date(2026, 7, 1), date(2026, 7, 2)]).await;

        let blocked = timeout(Duration::from_millis(50), locks.lock([date(2026, 7, 2)])).await;

        assert!(blocked.is_err(), "lock on a held date should not be granted");

        let free = timeout(Duration::from_millis(50), locks.lock([date(2026, 7, 3)])).await;

        assert!(free.is_ok(), "lock on an unrelated date should be granted");

        drop(held);

        let released = timeout(Duration::from_millis(50), locks.lock([date(2026, 7, 2)])).await;

        assert!(released.is_ok(), "lock should be granted after release");
    }
}
