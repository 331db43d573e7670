//! Extension host for the hub.
//!
//! Feature packages register typed declarations at startup; host surfaces
//! query them by tag, filter them through the feature-flag gate and resolve
//! their code references lazily.

pub mod config;
pub mod error;
pub mod flags;
pub mod host;
pub mod lazy;
pub mod logging;
pub mod manifest;
pub mod modules;
pub mod navigation;
pub mod notify;
pub mod resolver;
pub mod store;

pub use config::{HostConfig, ValidationMode};
pub use error::{HubError, Result};
pub use flags::{FeatureFlags, filter_active, is_active};
pub use host::{ExtensionHost, FeaturePackage};
pub use lazy::{LazySlot, SlotState};
pub use manifest::{ManifestLoader, PluginManifest};
pub use modules::{ModuleExports, ModuleLoader, ModuleRegistry};
pub use navigation::{NavNode, build_navigation};
pub use notify::{NotifyHandle, notify_on_change};
pub use resolver::CodeRefResolver;
pub use store::ExtensionStore;

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{HostConfig, ValidationMode, defaults, env_vars};

    // Error handling
    pub use crate::error::{HubError, Result};

    // Host
    pub use crate::flags::FeatureFlags;
    pub use crate::host::{ExtensionHost, FeaturePackage};
    pub use crate::lazy::{LazySlot, SlotState};
    pub use crate::modules::ModuleRegistry;

    // SDK
    pub use hub_extension_sdk::prelude::*;
}
