//! Lazily resolved code references.
//!
//! A [`CodeRef`] is a zero-argument function returning a future of the value
//! it points at. Declarations embed code references so the host only pays for
//! loading a component, hook or function when a consumer actually needs it.
//!
//! Every code reference carries a [`CodeRefId`]. Clones share the id, and so
//! does the type-erased form produced by [`CodeRef::erase`]; resolvers key
//! their caches on it.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::LoadError;

/// Result of loading a code reference.
pub type LoadResult<T> = Result<T, LoadError>;

/// Boxed future returned by a code reference loader.
pub type LoadFuture<T> = BoxFuture<'static, LoadResult<T>>;

/// Type-erased resolved value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Code reference whose value type has been erased.
pub type ErasedCodeRef = CodeRef<AnyValue>;

/// Named code references attached to a declaration.
pub type CodeRefs = BTreeMap<String, ErasedCodeRef>;

static NEXT_CODE_REF_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a code reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeRefId(u64);

impl CodeRefId {
    fn next() -> Self {
        Self(NEXT_CODE_REF_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CodeRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coderef#{}", self.0)
    }
}

type LoaderFn<T> = dyn Fn() -> LoadFuture<T> + Send + Sync;

/// Deferred pointer to an implementation.
pub struct CodeRef<T> {
    id: CodeRefId,
    loader: Arc<LoaderFn<T>>,
}

impl<T> Clone for CodeRef<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<T> fmt::Debug for CodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CodeRef").field(&self.id).finish()
    }
}

impl<T: Send + 'static> CodeRef<T> {
    /// Create a code reference from an async loader.
    ///
    /// The loader may be called more than once; callers that need a single
    /// fetch per reference go through a resolver.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<T>> + Send + 'static,
    {
        Self {
            id: CodeRefId::next(),
            loader: Arc::new(move || loader().boxed()),
        }
    }

    /// Create a code reference that resolves immediately to `value`.
    pub fn ready(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move || futures::future::ready(Ok(value.clone())))
    }

    /// Create a code reference that always fails with `error`.
    pub fn failing(error: LoadError) -> Self {
        Self::new(move || futures::future::ready(Err(error.clone())))
    }

    /// Identity of this reference.
    pub fn id(&self) -> CodeRefId {
        self.id
    }

    /// Invoke the underlying loader.
    pub fn load(&self) -> LoadFuture<T> {
        (self.loader)()
    }
}

impl<T: Any + Send + Sync> CodeRef<Arc<T>> {
    /// Erase the value type, keeping the identity.
    pub fn erase(self) -> ErasedCodeRef {
        let loader = self.loader;
        CodeRef {
            id: self.id,
            loader: Arc::new(move || {
                let fut = loader();
                async move { fut.await.map(|value| value as AnyValue) }.boxed()
            }),
        }
    }
}

impl ErasedCodeRef {
    /// Create an erased reference with an explicit identity.
    ///
    /// Used by hosts that materialize encoded references and need stable ids.
    pub fn with_id<F>(id: CodeRefId, loader: F) -> Self
    where
        F: Fn() -> LoadFuture<AnyValue> + Send + Sync + 'static,
    {
        Self {
            id,
            loader: Arc::new(loader),
        }
    }

    /// Allocate a fresh identity.
    pub fn fresh_id() -> CodeRefId {
        CodeRefId::next()
    }
}

/// Downcast an erased value to a concrete type.
pub fn downcast_value<T: Any + Send + Sync>(value: AnyValue) -> LoadResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| LoadError::TypeMismatch {
        expected: std::any::type_name::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_ready_ref_loads_value() {
        let r = CodeRef::ready(Arc::new(42u32));
        let value = r.load().await.unwrap();
        assert_eq!(*value, 42);
    }

    #[tokio::test]
    async fn test_clone_and_erase_keep_identity() {
        let r = CodeRef::ready(Arc::new("component"));
        let cloned = r.clone();
        let erased = r.clone().erase();
        assert_eq!(r.id(), cloned.id());
        assert_eq!(r.id(), erased.id());

        let value = erased.load().await.unwrap();
        let value = downcast_value::<&str>(value).unwrap();
        assert_eq!(*value, "component");
    }

    #[tokio::test]
    async fn test_distinct_refs_have_distinct_ids() {
        let a = CodeRef::ready(Arc::new(1u8));
        let b = CodeRef::ready(Arc::new(1u8));
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_load_calls_loader_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let r = CodeRef::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Arc::new(())) }
        });

        r.load().await.unwrap();
        r.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_downcast_mismatch() {
        let erased = CodeRef::ready(Arc::new(7i64)).erase();
        let value = erased.load().await.unwrap();
        let err = downcast_value::<String>(value).unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { .. }));
    }
}
