//! The persistence collaborator.
//!
//! The runtime only needs to acquire a handle per request and release it
//! afterwards; what the handle connects to is the persistence layer's
//! business. Handlers reach the concrete connection through
//! [`DbHandle::connection`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use switchyard_core::MeshError;
use thiserror::Error;

/// Failure to acquire or use a persistence handle.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The store cannot hand out a handle right now.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    /// The store has been shut down.
    #[error("persistence closed")]
    Closed,
}

impl From<PersistenceError> for MeshError {
    fn from(err: PersistenceError) -> Self {
        Self::persistence(err.to_string())
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// A request-scoped handle to a store.
#[derive(Clone)]
pub struct DbHandle {
    id: u64,
    connection: Arc<dyn Any + Send + Sync>,
}

impl DbHandle {
    /// Wraps a connection. Every handle gets a fresh id.
    pub fn new<C: Any + Send + Sync>(connection: Arc<C>) -> Self {
        Self {
            id: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            connection,
        }
    }

    /// Unique id of this handle.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The connection, if it is a `C`.
    #[must_use]
    pub fn connection<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.connection).downcast::<C>().ok()
    }
}

impl fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbHandle").field("id", &self.id).finish()
    }
}

/// Acquire/release pair implemented by a persistence layer.
pub trait Persistence: Send + Sync {
    /// Acquires a handle for one request.
    fn acquire(&self) -> BoxFuture<'_, Result<DbHandle, PersistenceError>>;

    /// Releases a handle. Called exactly once per acquired handle.
    fn release(&self, handle: DbHandle);
}

/// Owns an acquired handle and releases it on drop.
pub(crate) struct Lease {
    persistence: Arc<dyn Persistence>,
    handle: Option<DbHandle>,
}

impl Lease {
    pub(crate) async fn acquire(persistence: &Arc<dyn Persistence>) -> Result<Self, PersistenceError> {
        let handle = persistence.acquire().await?;
        Ok(Self {
            persistence: Arc::clone(persistence),
            handle: Some(handle),
        })
    }

    pub(crate) fn handle(&self) -> Option<DbHandle> {
        self.handle.clone()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::trace!(handle = handle.id(), "releasing persistence handle");
            self.persistence.release(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl Persistence for Counting {
        fn acquire(&self) -> BoxFuture<'_, Result<DbHandle, PersistenceError>> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            async { Ok(DbHandle::new(Arc::new(String::from("conn")))) }.boxed()
        }

        fn release(&self, _handle: DbHandle) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_handle_downcast() {
        let handle = DbHandle::new(Arc::new(7_u32));
        assert_eq!(handle.connection::<u32>().as_deref(), Some(&7));
        assert!(handle.connection::<String>().is_none());
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let a = DbHandle::new(Arc::new(()));
        let b = DbHandle::new(Arc::new(()));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[tokio::test]
    async fn test_lease_releases_on_drop() {
        let store = Arc::new(Counting::default());
        let persistence: Arc<dyn Persistence> = store.clone();

        let lease = Lease::acquire(&persistence).await.unwrap();
        assert!(lease.handle().is_some());
        assert_eq!(store.released.load(Ordering::SeqCst), 0);
        drop(lease);

        assert_eq!(store.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(store.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_maps_to_503() {
        let err: MeshError = PersistenceError::Closed.into();
        assert_eq!(err.status_code(), http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
