//! Hub Extension SDK
//!
//! This SDK defines the contract between independently built feature packages
//! and the hub host: the declaration shape, activation flags, lazily resolved
//! code references and typed extension kinds.
//!
//! # Quick Start
//!
//! ```rust
//! use hub_extension_sdk::prelude::*;
//!
//! let tab = Extension::new("model-registry.version-details/tab")
//!     .with_property("id", "details")
//!     .with_property("title", "Details")
//!     .with_required_flag("MODEL_REGISTRY")
//!     .with_code_ref("component", CodeRef::ready(std::sync::Arc::new("DetailsTab")));
//!
//! assert_eq!(tab.type_tag, "model-registry.version-details/tab");
//! assert!(tab.code_ref("component").is_some());
//! ```

#[macro_use]
pub mod macros;
pub mod code_ref;
pub mod error;
pub mod kind;
pub mod kinds;
pub mod types;

pub use code_ref::{
    AnyValue, CodeRef, CodeRefId, CodeRefs, ErasedCodeRef, LoadFuture, LoadResult, downcast_value,
};
pub use error::{ExtensionError, LoadError, Result};
pub use kind::{ExtensionKind, TypedExtension, is_kind};
pub use types::{Extension, ExtensionFlags, ExtensionProperties, LoadedExtension};

/// Property key used to encode a code reference inside JSON properties.
pub const CODE_REF_KEY: &str = "$codeRef";

/// Prelude module with common imports
pub mod prelude {
    pub use crate::code_ref::{AnyValue, CodeRef, CodeRefId, ErasedCodeRef};
    pub use crate::error::{ExtensionError, LoadError};
    pub use crate::kind::{ExtensionKind, TypedExtension, is_kind};
    pub use crate::kinds::{HrefNavItem, NavSection, Route, Tab};
    pub use crate::types::{Extension, ExtensionFlags, LoadedExtension};
    pub use crate::extension_kind;
    pub use serde_json::Value;
}
