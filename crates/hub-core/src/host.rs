//! Extension host.
//!
//! The host owns everything a shell needs to consume extensions: the store,
//! the flag state, the code reference resolver and the module registry. It
//! has two phases. During bootstrap feature packages and manifests register
//! their declarations; [`ExtensionHost::seal`] ends bootstrap, after which
//! the host is read-only.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use hub_extension_sdk::{
    ErasedCodeRef, Extension, ExtensionKind, LoadResult, LoadedExtension, TypedExtension,
};

use crate::config::HostConfig;
use crate::error::{HubError, Result};
use crate::flags::{filter_active, FeatureFlags};
use crate::lazy::LazySlot;
use crate::manifest::{ManifestLoader, PluginManifest};
use crate::modules::ModuleRegistry;
use crate::navigation::{build_navigation, NavNode};
use crate::resolver::CodeRefResolver;
use crate::store::{narrow_all, ExtensionStore};

/// A bundle of declarations contributed by one feature.
pub trait FeaturePackage: Send + Sync {
    /// Plugin name stamped on every declaration.
    fn name(&self) -> &str;

    fn declarations(&self) -> Vec<Extension>;
}

/// Host context for extension consumers.
pub struct ExtensionHost {
    store: ExtensionStore,
    flags: FeatureFlags,
    resolver: CodeRefResolver,
    modules: ModuleRegistry,
    manifests: ManifestLoader,
}

impl ExtensionHost {
    /// Host with default configuration and the given flags.
    pub fn new(flags: FeatureFlags) -> Self {
        Self::from_config(HostConfig::default().with_flags(flags), ModuleRegistry::new())
    }

    pub fn from_config(config: HostConfig, modules: ModuleRegistry) -> Self {
        let manifests =
            ManifestLoader::new(config.host_version.clone()).with_dirs(config.manifest_dirs);
        Self {
            store: ExtensionStore::with_builtin_kinds(config.validation),
            flags: config.flags,
            resolver: CodeRefResolver::new(),
            modules,
            manifests,
        }
    }

    /// Teach the store an extra kind for strict validation.
    ///
    /// Only possible before the host is shared.
    pub fn register_kind<K: ExtensionKind>(&mut self) {
        self.store.register_kind::<K>();
    }

    /// Register one plugin's declarations.
    ///
    /// Encoded code references are bound to the module registry first. An
    /// encoded reference that does not parse rejects the batch only in strict
    /// mode.
    pub fn register_plugin(
        &self,
        plugin_name: &str,
        mut declarations: Vec<Extension>,
    ) -> Result<Vec<Arc<LoadedExtension>>> {
        for (index, ext) in declarations.iter_mut().enumerate() {
            self.modules
                .materialize(ext, self.store.mode())
                .map_err(|source| HubError::InvalidDeclaration {
                    plugin: plugin_name.to_string(),
                    index,
                    source,
                })?;
        }
        self.store.register(plugin_name, declarations)
    }

    pub fn register_package(&self, package: &dyn FeaturePackage) -> Result<Vec<Arc<LoadedExtension>>> {
        self.register_plugin(package.name(), package.declarations())
    }

    /// Register a parsed manifest.
    pub fn register_manifest(&self, manifest: PluginManifest) -> Result<Vec<Arc<LoadedExtension>>> {
        self.register_plugin(&manifest.name, manifest.extensions)
    }

    /// Load and register a single manifest file.
    pub async fn load_manifest_file(&self, path: &Path) -> Result<Vec<Arc<LoadedExtension>>> {
        let manifest = self.manifests.load_file(path).await?;
        self.register_manifest(manifest)
    }

    /// Register every manifest found in the configured directories.
    ///
    /// A manifest whose declarations are rejected is skipped with a warning.
    /// Returns the number of declarations registered.
    pub async fn load_manifests(&self) -> Result<usize> {
        let mut registered = 0;
        for manifest in self.manifests.discover().await {
            let plugin = manifest.name.clone();
            match self.register_manifest(manifest) {
                Ok(loaded) => registered += loaded.len(),
                Err(e @ HubError::StoreSealed(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(plugin = %plugin, error = %e, "Skipping plugin");
                }
            }
        }
        Ok(registered)
    }

    /// Register `packages`, then discovered manifests, then seal.
    ///
    /// A package whose declarations are rejected is skipped with a warning,
    /// like a rejected manifest. The host is sealed even when bootstrap
    /// fails. Returns the number of registered declarations.
    pub async fn bootstrap(&self, packages: &[Box<dyn FeaturePackage>]) -> Result<usize> {
        let result = self.register_all(packages).await;
        self.seal();
        result?;

        let total = self.store.len();
        tracing::info!(
            packages = packages.len(),
            extensions = total,
            types = self.store.type_tags().len(),
            "Extension host ready"
        );
        Ok(total)
    }

    async fn register_all(&self, packages: &[Box<dyn FeaturePackage>]) -> Result<()> {
        for package in packages {
            match self.register_package(package.as_ref()) {
                Ok(_) => {}
                Err(e @ HubError::StoreSealed(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(plugin = %package.name(), error = %e, "Skipping package");
                }
            }
        }
        self.load_manifests().await?;
        Ok(())
    }

    /// End bootstrap. Later registration fails with [`HubError::StoreSealed`].
    pub fn seal(&self) {
        self.store.seal();
    }

    pub fn is_sealed(&self) -> bool {
        self.store.is_sealed()
    }

    pub fn store(&self) -> &ExtensionStore {
        &self.store
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn resolver(&self) -> &CodeRefResolver {
        &self.resolver
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Active declarations carrying `tag`, in registration order.
    pub fn active_by_type(&self, tag: &str) -> Vec<Arc<LoadedExtension>> {
        filter_active(self.store.get_by_type(tag), &self.flags)
    }

    /// Every active declaration, in registration order.
    pub fn active(&self) -> Vec<Arc<LoadedExtension>> {
        filter_active(self.store.all(), &self.flags)
    }

    /// Active declarations of kind `K`, narrowed to typed properties.
    pub fn extensions<K: ExtensionKind>(&self) -> Vec<TypedExtension<K>> {
        narrow_all::<K>(self.active_by_type(K::TYPE))
    }

    /// Mount a lazy slot for `code_ref` on the host resolver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn lazy<T: Any + Send + Sync>(&self, code_ref: &ErasedCodeRef) -> LazySlot<T> {
        LazySlot::mount(&self.resolver, code_ref)
    }

    /// Resolve `code_ref` through the host resolver.
    pub async fn resolve<T: Any + Send + Sync>(&self, code_ref: &ErasedCodeRef) -> LoadResult<Arc<T>> {
        self.resolver.resolve_as::<T>(code_ref).await
    }

    /// Navigation tree of the active navigation declarations.
    pub fn navigation(&self) -> Vec<NavNode> {
        build_navigation(&self.active())
    }
}

impl Default for ExtensionHost {
    fn default() -> Self {
        Self::new(FeatureFlags::new())
    }
}
