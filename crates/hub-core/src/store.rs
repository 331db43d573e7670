//! Extension store.
//!
//! The store keeps every registered declaration in registration order, with
//! a per-tag index for lookups. It is append-only: declarations are never
//! removed, and once the store is sealed at the end of bootstrap it rejects
//! further registration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hub_extension_sdk::kind::validate_kind;
use hub_extension_sdk::kinds::{HrefNavItem, NavSection, Route, Tab};
use hub_extension_sdk::{Extension, ExtensionKind, LoadedExtension, TypedExtension};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::ValidationMode;
use crate::error::{HubError, Result};

/// Validation function for one kind.
pub type KindValidator = fn(&Extension) -> hub_extension_sdk::Result<()>;

#[derive(Default)]
struct StoreInner {
    all: Vec<Arc<LoadedExtension>>,
    by_type: HashMap<String, Vec<Arc<LoadedExtension>>>,
}

/// Registry of all known extension declarations.
pub struct ExtensionStore {
    inner: RwLock<StoreInner>,
    validators: HashMap<&'static str, KindValidator>,
    mode: ValidationMode,
    sealed: AtomicBool,
}

impl ExtensionStore {
    /// Create an empty store that knows no kinds.
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            validators: HashMap::new(),
            mode,
            sealed: AtomicBool::new(false),
        }
    }

    /// Create a store that knows the built-in kinds.
    pub fn with_builtin_kinds(mode: ValidationMode) -> Self {
        let mut store = Self::new(mode);
        store.register_kind::<HrefNavItem>();
        store.register_kind::<NavSection>();
        store.register_kind::<Route>();
        store.register_kind::<Tab>();
        store
    }

    /// Teach the store how to validate kind `K` in strict mode.
    pub fn register_kind<K: ExtensionKind>(&mut self) {
        self.validators.insert(K::TYPE, validate_kind::<K>);
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Register a batch of declarations from one plugin.
    ///
    /// In strict mode every declaration with a known tag is validated first
    /// and the whole batch is rejected if any fails. Lenient mode accepts
    /// anything. Duplicate ids are not detected.
    pub fn register(
        &self,
        plugin_name: &str,
        declarations: Vec<Extension>,
    ) -> Result<Vec<Arc<LoadedExtension>>> {
        if self.is_sealed() {
            return Err(HubError::StoreSealed(plugin_name.to_string()));
        }

        if self.mode == ValidationMode::Strict {
            for (index, ext) in declarations.iter().enumerate() {
                if let Some(validate) = self.validators.get(ext.type_tag.as_str()) {
                    validate(ext).map_err(|source| HubError::InvalidDeclaration {
                        plugin: plugin_name.to_string(),
                        index,
                        source,
                    })?;
                }
            }
        }

        let loaded: Vec<Arc<LoadedExtension>> = declarations
            .into_iter()
            .enumerate()
            .map(|(index, ext)| {
                let uid = format!("{}[{}]_{}", plugin_name, index, Uuid::new_v4().simple());
                Arc::new(LoadedExtension::new(uid, plugin_name, ext))
            })
            .collect();

        let mut inner = self.inner.write();
        if self.is_sealed() {
            return Err(HubError::StoreSealed(plugin_name.to_string()));
        }
        for ext in &loaded {
            tracing::debug!(
                plugin = plugin_name,
                uid = %ext.uid,
                tag = %ext.type_tag(),
                "Registered extension"
            );
            inner.all.push(Arc::clone(ext));
            inner
                .by_type
                .entry(ext.type_tag().to_string())
                .or_default()
                .push(Arc::clone(ext));
        }

        Ok(loaded)
    }

    /// All declarations carrying `tag`, in registration order.
    pub fn get_by_type(&self, tag: &str) -> Vec<Arc<LoadedExtension>> {
        self.inner
            .read()
            .by_type
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// Declarations of kind `K`, narrowed to their typed properties.
    ///
    /// Malformed declarations are skipped with a warning.
    pub fn get_typed<K: ExtensionKind>(&self) -> Vec<TypedExtension<K>> {
        narrow_all::<K>(self.get_by_type(K::TYPE))
    }

    /// Every declaration, in registration order.
    pub fn all(&self) -> Vec<Arc<LoadedExtension>> {
        self.inner.read().all.clone()
    }

    /// Look up a declaration by uid.
    pub fn get(&self, uid: &str) -> Option<Arc<LoadedExtension>> {
        self.inner
            .read()
            .all
            .iter()
            .find(|ext| ext.uid == uid)
            .cloned()
    }

    /// Tags with at least one declaration.
    pub fn type_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.inner.read().by_type.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.inner.read().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End the registration phase.
    pub fn seal(&self) {
        let inner = self.inner.write();
        if !self.sealed.swap(true, Ordering::SeqCst) {
            tracing::debug!(extensions = inner.all.len(), "Extension store sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}

impl Default for ExtensionStore {
    fn default() -> Self {
        Self::with_builtin_kinds(ValidationMode::default())
    }
}

/// Narrow declarations to kind `K`, skipping other tags and malformed ones.
pub fn narrow_all<K: ExtensionKind>(
    extensions: impl IntoIterator<Item = Arc<LoadedExtension>>,
) -> Vec<TypedExtension<K>> {
    extensions
        .into_iter()
        .filter_map(|ext| {
            let uid = ext.uid.clone();
            match TypedExtension::<K>::narrow(ext) {
                Ok(typed) => typed,
                Err(e) => {
                    tracing::warn!(uid = %uid, error = %e, "Skipping malformed extension");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tab(id: &str) -> Extension {
        Extension::new("tab").with_property("id", id)
    }

    #[test]
    fn test_registration_order() {
        let store = ExtensionStore::new(ValidationMode::Lenient);
        store.register("pkg", vec![tab("a")]).unwrap();
        store.register("other", vec![tab("b")]).unwrap();

        let ids: Vec<_> = store
            .get_by_type("tab")
            .iter()
            .map(|e| e.extension.id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_type_is_empty() {
        let store = ExtensionStore::default();
        assert!(store.get_by_type("missing").is_empty());
    }

    #[test]
    fn test_uid_and_plugin_name() {
        let store = ExtensionStore::default();
        let loaded = store.register("pkg", vec![tab("a"), tab("b")]).unwrap();
        assert!(loaded[0].uid.starts_with("pkg[0]_"));
        assert!(loaded[1].uid.starts_with("pkg[1]_"));
        assert_eq!(loaded[1].plugin_name, "pkg");
        assert_ne!(loaded[0].uid, loaded[1].uid);
        assert!(store.get(&loaded[1].uid).is_some());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let store = ExtensionStore::default();
        store.register("pkg", vec![tab("a"), tab("a")]).unwrap();
        assert_eq!(store.get_by_type("tab").len(), 2);
    }

    #[test]
    fn test_sealed_rejects_registration() {
        let store = ExtensionStore::default();
        store.seal();
        let err = store.register("late", vec![tab("a")]).unwrap_err();
        assert!(matches!(err, HubError::StoreSealed(ref name) if name == "late"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_strict_rejects_whole_batch() {
        let store = ExtensionStore::with_builtin_kinds(ValidationMode::Strict);
        let good = Extension::new(HrefNavItem::TYPE)
            .with_properties(json!({"id": "home", "title": "Home", "href": "/"}));
        let bad = Extension::new(HrefNavItem::TYPE).with_property("id", "broken");

        let err = store.register("pkg", vec![good, bad]).unwrap_err();
        assert!(matches!(err, HubError::InvalidDeclaration { index: 1, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_lenient_accepts_and_typed_view_skips() {
        let store = ExtensionStore::with_builtin_kinds(ValidationMode::Lenient);
        let good = Extension::new(HrefNavItem::TYPE)
            .with_properties(json!({"id": "home", "title": "Home", "href": "/"}));
        let bad = Extension::new(HrefNavItem::TYPE).with_property("id", "broken");
        store.register("pkg", vec![good, bad]).unwrap();

        assert_eq!(store.get_by_type(HrefNavItem::TYPE).len(), 2);
        let typed = store.get_typed::<HrefNavItem>();
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].properties.id, "home");
    }

    #[test]
    fn test_strict_ignores_unknown_tags() {
        let store = ExtensionStore::with_builtin_kinds(ValidationMode::Strict);
        store
            .register("pkg", vec![Extension::new("vendor.widget")])
            .unwrap();
        assert_eq!(store.type_tags(), vec!["vendor.widget"]);
    }
}
