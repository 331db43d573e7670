//! Integration tests for declarations, kinds and code references.

use std::sync::Arc;

use hub_extension_sdk::kind::parse_properties;
use hub_extension_sdk::prelude::*;
use hub_extension_sdk::{LoadResult, downcast_value};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
pub struct VersionTabProperties {
    pub id: String,
    pub title: String,
}

extension_kind!(
    /// Tab on the model version details page.
    VersionTab,
    "model-registry.version-details/tab",
    VersionTabProperties,
    code_refs: ["component"],
);

// ========================================================================
// Wire format
// ========================================================================

#[test]
fn test_declaration_from_json() {
    let ext: Extension = serde_json::from_value(json!({
        "type": "app.navigation/href",
        "flags": { "required": ["HOME"], "disallowed": ["LEGACY"] },
        "properties": { "id": "home", "title": "Home", "href": "/", "group": "1_home" }
    }))
    .unwrap();

    assert_eq!(ext.type_tag, HrefNavItem::TYPE);
    assert_eq!(ext.id(), Some("home"));
    let flags = ext.flags.as_ref().unwrap();
    assert_eq!(flags.required, vec!["HOME"]);
    assert_eq!(flags.disallowed, vec!["LEGACY"]);
    assert!(ext.code_refs.is_empty());
}

#[test]
fn test_declaration_without_flags_or_properties() {
    let ext: Extension = serde_json::from_value(json!({ "type": "vendor.widget" })).unwrap();
    assert!(ext.flags.is_none());
    assert!(ext.properties.is_empty());

    let value = serde_json::to_value(&ext).unwrap();
    assert_eq!(value, json!({ "type": "vendor.widget", "properties": {} }));
}

#[test]
fn test_loaded_extension_serializes_flat() {
    let ext = Extension::new(Route::TYPE)
        .with_property("path", "/projects/*")
        .with_code_ref("component", CodeRef::ready(Arc::new("ProjectsRoutes")));
    let loaded = LoadedExtension::new("projects[0]_abc", "projects", ext);

    let value = serde_json::to_value(&loaded).unwrap();
    assert_eq!(value["uid"], "projects[0]_abc");
    assert_eq!(value["pluginName"], "projects");
    assert_eq!(value["type"], "app.route");
    assert_eq!(value["properties"]["path"], "/projects/*");
    assert!(value.get("codeRefs").is_none());
}

// ========================================================================
// Kinds
// ========================================================================

#[test]
fn test_custom_kind_narrowing() {
    let ext = Extension::new(VersionTab::TYPE)
        .with_properties(json!({ "id": "details", "title": "Details" }))
        .with_code_ref("component", CodeRef::ready(Arc::new("DetailsTab")));
    let loaded = Arc::new(LoadedExtension::new("mr[0]_x", "mr", ext));

    let typed = TypedExtension::<VersionTab>::narrow(Arc::clone(&loaded))
        .unwrap()
        .unwrap();
    assert_eq!(typed.properties.id, "details");
    assert_eq!(typed.plugin_name(), "mr");
    assert!(typed.code_ref("component").is_some());

    // Other kinds are not an error, just not a match.
    assert!(TypedExtension::<Tab>::narrow(loaded).unwrap().is_none());
}

#[test]
fn test_missing_code_ref_is_malformed() {
    let ext = Extension::new(VersionTab::TYPE)
        .with_properties(json!({ "id": "details", "title": "Details" }));

    let err = parse_properties::<VersionTab>(&ext).unwrap_err();
    assert!(matches!(err, ExtensionError::MissingCodeRef { ref name, .. } if name == "component"));
}

#[test]
fn test_wrong_property_type_is_malformed() {
    let ext = Extension::new(HrefNavItem::TYPE)
        .with_properties(json!({ "id": 7, "title": "Home", "href": "/" }));

    let err = parse_properties::<HrefNavItem>(&ext).unwrap_err();
    assert!(matches!(err, ExtensionError::Malformed { .. }));
    assert!(err.to_string().contains("app.navigation/href"));
}

#[test]
fn test_is_kind() {
    let ext = Extension::new(NavSection::TYPE);
    assert!(is_kind::<NavSection>(&ext));
    assert!(!is_kind::<HrefNavItem>(&ext));
}

// ========================================================================
// Code references
// ========================================================================

#[tokio::test]
async fn test_code_ref_called_repeatedly() {
    let code_ref = CodeRef::ready(Arc::new(42u32));
    assert_eq!(*code_ref.load().await.unwrap(), 42);
    assert_eq!(*code_ref.load().await.unwrap(), 42);
}

#[tokio::test]
async fn test_erased_ref_keeps_identity_and_downcasts() {
    let code_ref = CodeRef::ready(Arc::new("Page".to_string()));
    let erased = code_ref.clone().erase();
    assert_eq!(erased.id(), code_ref.id());

    let value = erased.load().await.unwrap();
    let page: LoadResult<Arc<String>> = downcast_value(Arc::clone(&value));
    assert_eq!(page.unwrap().as_str(), "Page");

    let wrong: LoadResult<Arc<u64>> = downcast_value(value);
    assert!(matches!(wrong, Err(LoadError::TypeMismatch { .. })));
}

#[tokio::test]
async fn test_failing_code_ref() {
    let code_ref = CodeRef::<Arc<String>>::failing(LoadError::failed("chunk 404"));
    let err = code_ref.load().await.unwrap_err();
    assert_eq!(err, LoadError::failed("chunk 404"));
}
