//! Built-in extension kinds understood by every host.

use serde::{Deserialize, Serialize};

/// Properties of an `app.navigation/href` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrefNavItemProperties {
    pub id: String,
    pub title: String,
    pub href: String,
    /// Id of the parent section; top level when absent.
    #[serde(default)]
    pub section: Option<String>,
    /// Path pattern used to mark the item active.
    #[serde(default)]
    pub path: Option<String>,
    /// Sort key among siblings.
    #[serde(default)]
    pub group: Option<String>,
}

/// Properties of an `app.navigation/section` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSectionProperties {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Id of the parent section for nested sections.
    #[serde(default)]
    pub section: Option<String>,
}

/// Properties of an `app.route` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteProperties {
    pub path: String,
}

/// Properties of an `app.tab` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabProperties {
    pub id: String,
    pub title: String,
    /// Host surface the tab is rendered into.
    pub slot: String,
}

extension_kind!(
    /// Navigation link.
    HrefNavItem,
    "app.navigation/href",
    HrefNavItemProperties,
);

extension_kind!(
    /// Navigation section grouping links and nested sections.
    NavSection,
    "app.navigation/section",
    NavSectionProperties,
);

extension_kind!(
    /// Routed page backed by a lazily loaded component.
    Route,
    "app.route",
    RouteProperties,
    code_refs: ["component"],
);

extension_kind!(
    /// Tab contributed into a host slot.
    Tab,
    "app.tab",
    TabProperties,
    code_refs: ["component"],
);
