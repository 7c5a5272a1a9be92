//! Bounded pool of connection slots

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits how many client connections are served at once
#[derive(Clone)]
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionPool {
    /// Create a new connection pool
    ///
    /// # Panics
    ///
    /// Panics if `max_connections` is 0
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        assert!(max_connections > 0, "max_connections must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Take a slot for a new connection
    ///
    /// Returns `None` when every slot is in use. The slot is released when
    /// the returned permit is dropped.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    /// Number of connections currently holding a slot
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.semaphore.available_permits()
    }

    /// Maximum number of connections
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_acquire_and_release() {
        let pool = ConnectionPool::new(2);
        assert_eq!(pool.max_connections(), 2);

        let first = pool.try_acquire();
        let second = pool.try_acquire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(pool.active_connections(), 2);
        assert!(pool.try_acquire().is_none());

        drop(first);
        assert_eq!(pool.active_connections(), 1);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    #[should_panic(expected = "max_connections must be > 0")]
    fn test_connection_pool_zero_panic() {
        let _ = ConnectionPool::new(0);
    }
}
