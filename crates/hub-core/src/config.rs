//! Host configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};
use crate::flags::FeatureFlags;

/// How the store treats declarations of known kinds at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Accept every declaration; malformed ones are skipped by typed queries.
    #[default]
    Lenient,
    /// Reject a plugin batch containing a malformed declaration.
    Strict,
}

/// Environment variable names.
pub mod env_vars {
    /// Comma list of flags: `NAME` enables, `!NAME` disables.
    pub const FEATURE_FLAGS: &str = "HUB_FEATURE_FLAGS";
    pub const STRICT_EXTENSIONS: &str = "HUB_STRICT_EXTENSIONS";
    /// Platform path list of manifest directories.
    pub const MANIFEST_DIRS: &str = "HUB_MANIFEST_DIRS";
    pub const LOG_JSON: &str = "HUB_LOG_JSON";
}

/// Default values.
pub mod defaults {
    pub const LOG_FILTER: &str = "hub=info";
    pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Configuration for an [`ExtensionHost`](crate::host::ExtensionHost).
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub validation: ValidationMode,
    pub flags: FeatureFlags,
    pub manifest_dirs: Vec<PathBuf>,
    pub host_version: Version,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            validation: ValidationMode::default(),
            flags: FeatureFlags::new(),
            manifest_dirs: Vec::new(),
            host_version: default_host_version(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    flags: HashMap<String, bool>,
    strict: Option<bool>,
    #[serde(default)]
    manifest_dirs: Vec<PathBuf>,
}

impl HostConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid with a JSON config file.
    ///
    /// Relative manifest directories are resolved against the file's
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&text)
            .map_err(|e| HubError::Config(format!("{}: {}", path.display(), e)))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let mut config = Self::default();
        config.flags.merge(FeatureFlags::from(file.flags));
        if let Some(strict) = file.strict {
            config.validation = mode_for(strict);
        }
        config.manifest_dirs = file
            .manifest_dirs
            .into_iter()
            .map(|dir| if dir.is_relative() { base.join(dir) } else { dir })
            .collect();
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(list) = lookup(env_vars::FEATURE_FLAGS) {
            self.flags.merge(FeatureFlags::parse_list(&list));
        }
        if let Some(value) = lookup(env_vars::STRICT_EXTENSIONS) {
            let strict = parse_bool(env_vars::STRICT_EXTENSIONS, &value)?;
            self.validation = mode_for(strict);
        }
        if let Some(dirs) = lookup(env_vars::MANIFEST_DIRS) {
            self.manifest_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        Ok(())
    }

    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifest_dirs.push(dir.into());
        self
    }
}

/// Whether JSON log output was requested through the environment.
pub fn json_logging() -> bool {
    json_logging_from(|name| std::env::var(name).ok())
}

fn json_logging_from(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup(env_vars::LOG_JSON)
        .and_then(|v| parse_bool(env_vars::LOG_JSON, &v).ok())
        .unwrap_or(false)
}

fn default_host_version() -> Version {
    Version::parse(defaults::HOST_VERSION).unwrap_or_else(|_| Version::new(0, 0, 0))
}

fn mode_for(strict: bool) -> ValidationMode {
    if strict {
        ValidationMode::Strict
    } else {
        ValidationMode::Lenient
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(HubError::Config(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.validation, ValidationMode::Lenient);
        assert!(config.flags.is_empty());
        assert!(config.manifest_dirs.is_empty());
        assert_eq!(config.host_version.to_string(), defaults::HOST_VERSION);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HostConfig::default().with_flags(FeatureFlags::new().with("A", true));
        config
            .apply_env_from(env(&[
                (env_vars::FEATURE_FLAGS, "!A, B, !C"),
                (env_vars::STRICT_EXTENSIONS, "true"),
            ]))
            .unwrap();

        assert_eq!(config.validation, ValidationMode::Strict);
        assert!(!config.flags.is_enabled("A"));
        assert!(config.flags.is_enabled("B"));
        assert!(!config.flags.is_enabled("C"));
    }

    #[test]
    fn test_env_manifest_dirs() {
        let joined = std::env::join_paths(["/opt/hub/plugins", "/srv/plugins"]).unwrap();
        let mut config = HostConfig::default();
        config
            .apply_env_from(env(&[(env_vars::MANIFEST_DIRS, joined.to_str().unwrap())]))
            .unwrap();
        assert_eq!(
            config.manifest_dirs,
            vec![PathBuf::from("/opt/hub/plugins"), PathBuf::from("/srv/plugins")]
        );
    }

    #[test]
    fn test_json_logging_spellings() {
        for value in ["true", "1", "YES", " yes "] {
            assert!(json_logging_from(env(&[(env_vars::LOG_JSON, value)])));
        }
        for value in ["false", "0", "no", "", "maybe"] {
            assert!(!json_logging_from(env(&[(env_vars::LOG_JSON, value)])));
        }
        assert!(!json_logging_from(env(&[])));
    }

    #[test]
    fn test_invalid_bool() {
        let mut config = HostConfig::default();
        let err = config
            .apply_env_from(env(&[(env_vars::STRICT_EXTENSIONS, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, HubError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.json");
        std::fs::write(
            &path,
            r#"{"flags": {"HOME": true, "ADMIN_USER": false}, "strict": true, "manifestDirs": ["plugins"]}"#,
        )
        .unwrap();

        let config = HostConfig::from_file(&path).unwrap();
        assert!(config.flags.is_enabled("HOME"));
        assert!(!config.flags.is_enabled("ADMIN_USER"));
        assert_eq!(config.validation, ValidationMode::Strict);
        assert_eq!(config.manifest_dirs, vec![dir.path().join("plugins")]);
    }
}
