//! Declarative macros for defining extension kinds.

/// Define a marker type implementing [`ExtensionKind`](crate::ExtensionKind).
///
/// # Example
///
/// ```rust
/// use hub_extension_sdk::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// pub struct VersionTabProperties {
///     pub id: String,
///     pub title: String,
/// }
///
/// extension_kind!(
///     /// Tab on the model version details page.
///     VersionTab,
///     "model-registry.version-details/tab",
///     VersionTabProperties,
///     code_refs: ["component"],
/// );
///
/// assert_eq!(<VersionTab as ExtensionKind>::TYPE, "model-registry.version-details/tab");
/// ```
#[macro_export]
macro_rules! extension_kind {
    (
        $(#[$meta:meta])*
        $name:ident,
        $tag:expr,
        $props:ty $(,)?
    ) => {
        $crate::extension_kind! {
            $(#[$meta])*
            $name,
            $tag,
            $props,
            code_refs: [],
        }
    };
    (
        $(#[$meta:meta])*
        $name:ident,
        $tag:expr,
        $props:ty,
        code_refs: [$($code_ref:expr),* $(,)?] $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl $crate::kind::ExtensionKind for $name {
            const TYPE: &'static str = $tag;
            type Properties = $props;

            fn required_code_refs() -> &'static [&'static str] {
                &[$($code_ref),*]
            }
        }
    };
}
