use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::mongodb::Id;

type PairLock = AsyncMutex<()>;

/// Per-`(voter, election)` locks, so that votes for the same pair are
/// linearized while votes for different pairs never contend.
///
/// Entries are held weakly and swept whenever a new lock is created, so the
/// map only grows with the number of votes currently in flight.
#[derive(Default)]
pub struct BallotLocks {
    locks: Mutex<HashMap<(Id, Id), Weak<PairLock>>>,
}

impl BallotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the given pair. Access is released when
    /// the guard is dropped.
    pub async fn acquire(&self, voter: Id, election: Id) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(voter, election);
        lock.lock_owned().await
    }

    fn lock_for(&self, voter: Id, election: Id) -> Arc<PairLock> {
        // Never held across an await.
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(lock) = locks.get(&(voter, election)).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(PairLock::new(()));
        locks.insert((voter, election), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rocket::tokio::time::timeout;

    use super::*;

    #[rocket::async_test]
    async fn same_pair_is_exclusive() {
        let locks = BallotLocks::new();
        let (voter, election) = (Id::new(), Id::new());

        let guard = locks.acquire(voter, election).await;
        let blocked = timeout(Duration::from_millis(50), locks.acquire(voter, election)).await;
        assert!(blocked.is_err());

        drop(guard);
        let unblocked = timeout(Duration::from_millis(50), locks.acquire(voter, election)).await;
        assert!(unblocked.is_ok());
    }

    #[rocket::async_test]
    async fn different_pairs_are_independent() {
        let locks = BallotLocks::new();
        let voter = Id::new();

        let _first = locks.acquire(voter, Id::new()).await;
        let second = timeout(Duration::from_millis(50), locks.acquire(voter, Id::new())).await;
        assert!(second.is_ok());
    }

    #[rocket::async_test]
    async fn released_locks_are_swept() {
        let locks = BallotLocks::new();
        for _ in 0..10 {
            let _guard = locks.acquire(Id::new(), Id::new()).await;
        }
        // Each new pair sweeps every dead entry before inserting itself.
        assert_eq!(locks.tracked(), 1);
    }
}
