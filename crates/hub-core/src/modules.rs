//! Module registry for encoded code references.
//!
//! Manifests cannot carry closures, so a declaration loaded from JSON refers
//! to an implementation by name: `{"$codeRef": "module.export"}`. The host
//! registers a [`ModuleLoader`] per module name and turns every encoded
//! reference into a real [`ErasedCodeRef`] when the declaration is
//! registered. A module is loaded at most once; a failed load is retried on
//! the next request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::FutureExt;
use hub_extension_sdk::{
    AnyValue, CODE_REF_KEY, CodeRefId, ErasedCodeRef, Extension, ExtensionError, LoadError,
    LoadResult,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::ValidationMode;

/// Export used when an encoded reference names only a module.
pub const DEFAULT_EXPORT: &str = "default";

/// Named exports of a loaded module.
pub type ModuleExports = HashMap<String, AnyValue>;

/// Loads one module's exports.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self) -> LoadResult<ModuleExports>;
}

/// [`ModuleLoader`] backed by a closure.
pub struct FnModuleLoader<F>(F);

#[async_trait]
impl<F, Fut> ModuleLoader for FnModuleLoader<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = LoadResult<ModuleExports>> + Send + 'static,
{
    async fn load(&self) -> LoadResult<ModuleExports> {
        (self.0)().await
    }
}

struct ModuleEntry {
    loader: Arc<dyn ModuleLoader>,
    exports: OnceCell<Arc<ModuleExports>>,
}

#[derive(Default)]
struct RegistryInner {
    modules: RwLock<HashMap<String, Arc<ModuleEntry>>>,
    ref_ids: Mutex<HashMap<(String, String), CodeRefId>>,
}

/// Registry of named modules. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    inner: Arc<RegistryInner>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module loader, replacing any previous loader for `name`.
    ///
    /// Replacement only affects exports not yet resolved. Code reference
    /// identities are stable per `(module, export)`, so a resolver that
    /// already holds a value keeps serving it.
    pub fn register(&self, name: impl Into<String>, loader: impl ModuleLoader + 'static) {
        let name = name.into();
        tracing::debug!(module = %name, "Registered module");
        self.inner.modules.write().insert(
            name,
            Arc::new(ModuleEntry {
                loader: Arc::new(loader),
                exports: OnceCell::new(),
            }),
        );
    }

    /// Register a module loader from a closure.
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, loader: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = LoadResult<ModuleExports>> + Send + 'static,
    {
        self.register(name, FnModuleLoader(loader));
    }

    /// Register a module whose exports are already available.
    pub fn register_static(&self, name: impl Into<String>, exports: ModuleExports) {
        let exports = Arc::new(exports);
        self.register_fn(name, move || {
            let exports = Arc::clone(&exports);
            async move { Ok((*exports).clone()) }
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.modules.read().contains_key(name)
    }

    /// Load a module, at most once.
    pub async fn load_module(&self, name: &str) -> LoadResult<Arc<ModuleExports>> {
        let entry = self
            .inner
            .modules
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::ModuleNotFound(name.to_string()))?;

        entry
            .exports
            .get_or_try_init(|| async {
                tracing::debug!(module = %name, "Loading module");
                entry.loader.load().await.map(Arc::new)
            })
            .await
            .cloned()
    }

    /// Load a single export.
    pub async fn load_export(&self, module: &str, export: &str) -> LoadResult<AnyValue> {
        let exports = self.load_module(module).await?;
        exports
            .get(export)
            .cloned()
            .ok_or_else(|| LoadError::ExportNotFound {
                module: module.to_string(),
                export: export.to_string(),
            })
    }

    /// Build a code reference for `module.export`.
    ///
    /// The same module and export always map to the same identity, so every
    /// declaration pointing at it shares one resolver cache entry.
    pub fn code_ref(&self, module: &str, export: &str) -> ErasedCodeRef {
        let key = (module.to_string(), export.to_string());
        let id = *self
            .inner
            .ref_ids
            .lock()
            .entry(key)
            .or_insert_with(ErasedCodeRef::fresh_id);

        let registry = self.clone();
        let module = module.to_string();
        let export = export.to_string();
        ErasedCodeRef::with_id(id, move || {
            let registry = registry.clone();
            let module = module.clone();
            let export = export.clone();
            async move { registry.load_export(&module, &export).await }.boxed()
        })
    }

    /// Replace every encoded reference among `ext`'s top-level properties
    /// with a code reference.
    ///
    /// Unknown modules are not an error here; they surface when the
    /// reference is resolved. A reference that does not parse is an error
    /// in strict mode. In lenient mode it is bound to a reference that
    /// always fails, so consumers see a failed load.
    pub fn materialize(
        &self,
        ext: &mut Extension,
        mode: ValidationMode,
    ) -> hub_extension_sdk::Result<()> {
        let encoded: Vec<(String, String)> = ext
            .properties
            .iter()
            .filter_map(|(key, value)| encoded_ref(value).map(|r| (key.clone(), r.to_string())))
            .collect();

        for (key, reference) in encoded {
            let code_ref = match parse_encoded_ref(&reference) {
                Ok((module, export)) => self.code_ref(module, export),
                Err(e) if mode == ValidationMode::Lenient => {
                    tracing::warn!(
                        tag = %ext.type_tag,
                        property = %key,
                        error = %e,
                        "Binding invalid code reference to a failing load"
                    );
                    broken_ref(e.to_string())
                }
                Err(e) => return Err(e),
            };
            ext.properties.remove(&key);
            ext.code_refs.insert(key, code_ref);
        }
        Ok(())
    }
}

fn broken_ref(message: String) -> ErasedCodeRef {
    let error = LoadError::failed(message);
    ErasedCodeRef::with_id(ErasedCodeRef::fresh_id(), move || {
        futures::future::ready(Err(error.clone())).boxed()
    })
}

/// The encoded reference string, if `value` is `{"$codeRef": "..."}`.
fn encoded_ref(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(CODE_REF_KEY)?.as_str(),
        _ => None,
    }
}

/// Split `module.export` into its parts. A bare `module` names the default
/// export.
pub fn parse_encoded_ref(reference: &str) -> hub_extension_sdk::Result<(&str, &str)> {
    let (module, export) = match reference.split_once('.') {
        Some((module, export)) => (module, export),
        None => (reference, DEFAULT_EXPORT),
    };
    if module.is_empty() || export.is_empty() {
        return Err(ExtensionError::InvalidCodeRef(reference.to_string()));
    }
    Ok((module, export))
}
