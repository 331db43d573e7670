//! Feature-flag state and the activation gate.
//!
//! Flag state is a flat name → bool mapping supplied once at startup. A flag
//! that is not present reads as disabled.

use std::collections::HashMap;
use std::sync::Arc;

use hub_extension_sdk::{Extension, LoadedExtension};
use serde::{Deserialize, Serialize};

/// Process-wide feature-flag state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(HashMap<String, bool>);

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated list: `name` enables, `!name` disables.
    ///
    /// Blank entries are ignored.
    pub fn parse_list(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.strip_prefix('!') {
                Some(name) => (name.trim().to_string(), false),
                None => (entry.to_string(), true),
            })
            .collect()
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    /// Whether `name` is enabled. Missing flags are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: FeatureFlags) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for FeatureFlags {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<HashMap<String, bool>> for FeatureFlags {
    fn from(map: HashMap<String, bool>) -> Self {
        Self(map)
    }
}

/// Whether a declaration is active under `flags`.
///
/// Every required flag must be enabled and no disallowed flag may be enabled.
/// Declarations without flags are always active.
pub fn is_active(extension: &Extension, flags: &FeatureFlags) -> bool {
    let Some(ext_flags) = &extension.flags else {
        return true;
    };
    ext_flags.required.iter().all(|f| flags.is_enabled(f))
        && !ext_flags.disallowed.iter().any(|f| flags.is_enabled(f))
}

/// Keep only the active declarations, preserving order.
pub fn filter_active(
    extensions: Vec<Arc<LoadedExtension>>,
    flags: &FeatureFlags,
) -> Vec<Arc<LoadedExtension>> {
    extensions
        .into_iter()
        .filter(|ext| is_active(&ext.extension, flags))
        .collect()
}
