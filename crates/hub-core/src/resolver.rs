//! Code reference resolver.
//!
//! The resolver calls a code reference's loader at most once per identity and
//! hands every caller the same in-flight or completed result. The load runs
//! on its own tokio task, so it keeps going when the caller that started it
//! goes away.
//!
//! A failed load is evicted from the cache once it settles: callers already
//! waiting on it see the error, later callers trigger a fresh load.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use hub_extension_sdk::code_ref::downcast_value;
use hub_extension_sdk::{AnyValue, CodeRef, CodeRefId, ErasedCodeRef, LoadError, LoadResult};
use parking_lot::Mutex;

type SharedLoad = Shared<BoxFuture<'static, LoadResult<AnyValue>>>;

struct CacheEntry {
    generation: u64,
    load: SharedLoad,
    resolved: Arc<OnceLock<AnyValue>>,
}

#[derive(Default)]
struct ResolverInner {
    cache: Mutex<HashMap<CodeRefId, CacheEntry>>,
    generation: AtomicU64,
    loads_started: AtomicU64,
}

/// Caching resolver for code references.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone, Default)]
pub struct CodeRefResolver {
    inner: Arc<ResolverInner>,
}

impl CodeRefResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an erased code reference.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn resolve_erased(&self, code_ref: &ErasedCodeRef) -> LoadResult<AnyValue> {
        let load = self.shared_load(code_ref);
        load.await
    }

    /// Resolve an erased code reference and downcast the value.
    pub async fn resolve_as<T: Any + Send + Sync>(
        &self,
        code_ref: &ErasedCodeRef,
    ) -> LoadResult<Arc<T>> {
        let value = self.resolve_erased(code_ref).await?;
        downcast_value::<T>(value)
    }

    /// Resolve a typed code reference.
    pub async fn resolve<T: Any + Send + Sync>(&self, code_ref: &CodeRef<Arc<T>>) -> LoadResult<Arc<T>> {
        self.resolve_as::<T>(&code_ref.clone().erase()).await
    }

    /// The value for `id`, if its load has completed successfully.
    pub fn resolved(&self, id: CodeRefId) -> Option<AnyValue> {
        self.inner
            .cache
            .lock()
            .get(&id)
            .and_then(|entry| entry.resolved.get().cloned())
    }

    /// Whether a load for `id` is in flight or cached.
    pub fn contains(&self, id: CodeRefId) -> bool {
        self.inner.cache.lock().contains_key(&id)
    }

    /// Number of cached references.
    pub fn cached_count(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Number of underlying loads started since creation.
    pub fn loads_started(&self) -> u64 {
        self.inner.loads_started.load(Ordering::Relaxed)
    }

    fn shared_load(&self, code_ref: &ErasedCodeRef) -> SharedLoad {
        let id = code_ref.id();
        let mut cache = self.inner.cache.lock();
        if let Some(entry) = cache.get(&id) {
            return entry.load.clone();
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        self.inner.loads_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(code_ref = %id, "Resolving code reference");

        let resolved = Arc::new(OnceLock::new());
        let slot = Arc::clone(&resolved);
        let weak = Arc::downgrade(&self.inner);
        let fetch = code_ref.load();
        let task = tokio::spawn(async move {
            let result = fetch.await;
            match &result {
                Ok(value) => {
                    let _ = slot.set(Arc::clone(value));
                }
                Err(e) => {
                    tracing::warn!(code_ref = %id, error = %e, "Code reference failed to load");
                    evict(&weak, id, generation);
                }
            }
            result
        });

        let weak = Arc::downgrade(&self.inner);
        let load = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    evict(&weak, id, generation);
                    Err(LoadError::failed(format!("loader task failed: {}", e)))
                }
            }
        }
        .boxed()
        .shared();

        cache.insert(
            id,
            CacheEntry {
                generation,
                load: load.clone(),
                resolved,
            },
        );
        load
    }
}

fn evict(inner: &Weak<ResolverInner>, id: CodeRefId, generation: u64) {
    if let Some(inner) = inner.upgrade() {
        let mut cache = inner.cache.lock();
        if cache.get(&id).is_some_and(|entry| entry.generation == generation) {
            cache.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_ref(calls: Arc<AtomicUsize>, fail: bool) -> CodeRef<Arc<String>> {
        CodeRef::new(move || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                if fail {
                    Err(LoadError::failed("network down"))
                } else {
                    Ok(Arc::new("Component".to_string()))
                }
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_resolution_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let code_ref = counting_ref(Arc::clone(&calls), false);
        let resolver = CodeRefResolver::new();

        let (a, b) = tokio::join!(resolver.resolve(&code_ref), resolver.resolve(&code_ref));
        let a = a.unwrap();
        let b = b.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.loads_started(), 1);
    }

    #[tokio::test]
    async fn test_sequential_resolution_uses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let code_ref = counting_ref(Arc::clone(&calls), false);
        let resolver = CodeRefResolver::new();

        resolver.resolve(&code_ref).await.unwrap();
        resolver.resolve(&code_ref.clone()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(resolver.resolved(code_ref.id()).is_some());
    }

    #[tokio::test]
    async fn test_failure_is_shared_then_evicted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let code_ref = counting_ref(Arc::clone(&calls), true);
        let resolver = CodeRefResolver::new();

        let (a, b) = tokio::join!(resolver.resolve(&code_ref), resolver.resolve(&code_ref));
        assert_eq!(a.unwrap_err(), LoadError::failed("network down"));
        assert!(b.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!resolver.contains(code_ref.id()));

        assert!(resolver.resolve(&code_ref).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let resolver = CodeRefResolver::new();
        let erased = CodeRef::ready(Arc::new(1u32)).erase();
        let err = resolver.resolve_as::<String>(&erased).await.unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_load_continues_after_caller_drops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let code_ref = counting_ref(Arc::clone(&calls), false);
        let resolver = CodeRefResolver::new();

        let erased = code_ref.clone().erase();
        let pending = resolver.resolve_erased(&erased);
        // Poll once to start the load, then drop the caller.
        let _ = tokio::time::timeout(Duration::from_millis(1), pending).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(resolver.resolved(erased.id()).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
