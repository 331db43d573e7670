//! Declaration types shared between feature packages and the host.
//!
//! The JSON shape of [`Extension`] (`type`, `properties`, `flags`) is the wire
//! contract between independently built packages. Changing a tag or the shape
//! of its properties is a breaking change and must be versioned by tag name.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::code_ref::{CodeRef, CodeRefs, ErasedCodeRef};

/// Free-form declaration payload. Its shape depends on the type tag.
pub type ExtensionProperties = serde_json::Map<String, Value>;

/// Activation flags of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFlags {
    /// Flags that must all be enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Flags that must all be disabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disallowed: Vec<String>,
}

impl ExtensionFlags {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.disallowed.is_empty()
    }
}

/// A contribution declared by a feature package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extension {
    /// Type tag selecting the expected shape of `properties`.
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Payload
    #[serde(default)]
    pub properties: ExtensionProperties,

    /// Optional activation flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<ExtensionFlags>,

    /// Lazily resolved implementations, keyed by property name.
    #[serde(skip)]
    pub code_refs: CodeRefs,
}

impl Extension {
    /// Create a declaration with an empty payload.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            ..Default::default()
        }
    }

    /// Set a single property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge every field of a JSON object into the properties.
    ///
    /// Non-object values are ignored.
    pub fn with_properties(mut self, value: Value) -> Self {
        if let Value::Object(map) = value {
            self.properties.extend(map);
        }
        self
    }

    /// Add a flag that must be enabled for the declaration to be active.
    pub fn with_required_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags
            .get_or_insert_with(ExtensionFlags::default)
            .required
            .push(flag.into());
        self
    }

    /// Add a flag that must be disabled for the declaration to be active.
    pub fn with_disallowed_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags
            .get_or_insert_with(ExtensionFlags::default)
            .disallowed
            .push(flag.into());
        self
    }

    /// Attach a typed code reference.
    pub fn with_code_ref<T: Any + Send + Sync>(
        self,
        name: impl Into<String>,
        code_ref: CodeRef<Arc<T>>,
    ) -> Self {
        self.with_erased_code_ref(name, code_ref.erase())
    }

    /// Attach an already erased code reference.
    pub fn with_erased_code_ref(mut self, name: impl Into<String>, code_ref: ErasedCodeRef) -> Self {
        self.code_refs.insert(name.into(), code_ref);
        self
    }

    /// Look up a property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Look up a code reference.
    pub fn code_ref(&self, name: &str) -> Option<&ErasedCodeRef> {
        self.code_refs.get(name)
    }

    /// The conventional `id` property, if present.
    pub fn id(&self) -> Option<&str> {
        self.properties.get("id").and_then(Value::as_str)
    }
}

/// A declaration after registration.
///
/// The store stamps every declaration with a unique `uid` and the name of the
/// plugin that registered it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedExtension {
    pub uid: String,
    pub plugin_name: String,
    #[serde(flatten)]
    pub extension: Extension,
}

impl LoadedExtension {
    pub fn new(uid: impl Into<String>, plugin_name: impl Into<String>, extension: Extension) -> Self {
        Self {
            uid: uid.into(),
            plugin_name: plugin_name.into(),
            extension,
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.extension.type_tag
    }

    pub fn properties(&self) -> &ExtensionProperties {
        &self.extension.properties
    }

    pub fn flags(&self) -> Option<&ExtensionFlags> {
        self.extension.flags.as_ref()
    }

    pub fn code_ref(&self, name: &str) -> Option<&ErasedCodeRef> {
        self.extension.code_ref(name)
    }
}
