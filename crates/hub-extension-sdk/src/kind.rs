//! Typed extension kinds.
//!
//! An [`ExtensionKind`] ties a type tag to the Rust type of its properties.
//! Consumers narrow untyped declarations with [`is_kind`] and
//! [`TypedExtension::narrow`], which is the Rust form of a type-guard
//! predicate keyed on the tag.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::code_ref::ErasedCodeRef;
use crate::error::{ExtensionError, Result};
use crate::types::{Extension, ExtensionFlags, LoadedExtension};

/// A known contribution kind.
pub trait ExtensionKind: Send + Sync + 'static {
    /// Type tag, e.g. `app.navigation/href`.
    const TYPE: &'static str;

    /// Typed shape of the declaration properties.
    type Properties: DeserializeOwned + Send + Sync + 'static;

    /// Code references every declaration of this kind must carry.
    fn required_code_refs() -> &'static [&'static str] {
        &[]
    }

    /// Extra checks beyond deserialization.
    fn validate(_properties: &Self::Properties) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Whether `ext` carries the tag of kind `K`.
pub fn is_kind<K: ExtensionKind>(ext: &Extension) -> bool {
    ext.type_tag == K::TYPE
}

/// Parse and validate the properties of `ext` as kind `K`.
///
/// The caller is expected to have checked the tag.
pub fn parse_properties<K: ExtensionKind>(ext: &Extension) -> Result<K::Properties> {
    let properties: K::Properties = serde_json::from_value(Value::Object(ext.properties.clone()))
        .map_err(|e| ExtensionError::Malformed {
            type_tag: ext.type_tag.clone(),
            reason: e.to_string(),
        })?;

    for name in K::required_code_refs() {
        if ext.code_ref(name).is_none() {
            return Err(ExtensionError::MissingCodeRef {
                type_tag: ext.type_tag.clone(),
                name: (*name).to_string(),
            });
        }
    }

    K::validate(&properties).map_err(|reason| ExtensionError::Malformed {
        type_tag: ext.type_tag.clone(),
        reason,
    })?;

    Ok(properties)
}

/// Validate `ext` against kind `K`, discarding the parsed properties.
pub fn validate_kind<K: ExtensionKind>(ext: &Extension) -> Result<()> {
    parse_properties::<K>(ext).map(|_| ())
}

/// A registered declaration narrowed to kind `K`.
pub struct TypedExtension<K: ExtensionKind> {
    pub properties: K::Properties,
    source: Arc<LoadedExtension>,
}

impl<K: ExtensionKind> TypedExtension<K> {
    /// Narrow a registered declaration.
    ///
    /// Returns `Ok(None)` when the tag does not match, and an error when the
    /// tag matches but the declaration is malformed.
    pub fn narrow(source: Arc<LoadedExtension>) -> Result<Option<Self>> {
        if !is_kind::<K>(&source.extension) {
            return Ok(None);
        }
        let properties = parse_properties::<K>(&source.extension)?;
        Ok(Some(Self { properties, source }))
    }

    pub fn uid(&self) -> &str {
        &self.source.uid
    }

    pub fn plugin_name(&self) -> &str {
        &self.source.plugin_name
    }

    pub fn flags(&self) -> Option<&ExtensionFlags> {
        self.source.flags()
    }

    pub fn code_ref(&self, name: &str) -> Option<&ErasedCodeRef> {
        self.source.code_ref(name)
    }

    /// The untyped declaration this view was built from.
    pub fn source(&self) -> &Arc<LoadedExtension> {
        &self.source
    }
}

impl<K: ExtensionKind> Clone for TypedExtension<K>
where
    K::Properties: Clone,
{
    fn clone(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<K: ExtensionKind> fmt::Debug for TypedExtension<K>
where
    K::Properties: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedExtension")
            .field("type", &K::TYPE)
            .field("uid", &self.source.uid)
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct TabProps {
        id: String,
    }

    struct TestTab;

    impl ExtensionKind for TestTab {
        const TYPE: &'static str = "tab";
        type Properties = TabProps;

        fn validate(properties: &TabProps) -> std::result::Result<(), String> {
            if properties.id.is_empty() {
                return Err("id must not be empty".to_string());
            }
            Ok(())
        }
    }

    fn loaded(ext: Extension) -> Arc<LoadedExtension> {
        Arc::new(LoadedExtension::new("test[0]", "test", ext))
    }

    #[test]
    fn test_narrow_matching_tag() {
        let typed = TypedExtension::<TestTab>::narrow(loaded(
            Extension::new("tab").with_property("id", "a"),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(typed.properties.id, "a");
        assert_eq!(typed.plugin_name(), "test");
    }

    #[test]
    fn test_narrow_other_tag() {
        let result = TypedExtension::<TestTab>::narrow(loaded(Extension::new("route")));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_narrow_malformed() {
        let result = TypedExtension::<TestTab>::narrow(loaded(
            Extension::new("tab").with_properties(json!({"title": "no id"})),
        ));
        assert!(matches!(result, Err(ExtensionError::Malformed { .. })));
    }

    #[test]
    fn test_validate_hook_rejects() {
        let ext = Extension::new("tab").with_property("id", "");
        let err = validate_kind::<TestTab>(&ext).unwrap_err();
        assert!(err.to_string().contains("id must not be empty"));
    }
}
