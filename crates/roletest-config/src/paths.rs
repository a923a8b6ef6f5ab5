//! Search paths handed to ansible inside the test container
//!
//! A paths file is TOML:
//!
//! ```toml
//! roles = "../roles"
//! library = "library"
//!
//! [plugins]
//! action = "plugins/action"
//! filter = "plugins/filter"
//! lookup = "plugins/lookup"
//! ```
//!
//! Relative entries are resolved against the directory holding the file.

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host-side search paths for roles, modules and plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolePaths {
    /// Search path for non-galaxy roles required as dependencies
    pub roles: Option<PathBuf>,
    /// Search path for custom modules
    pub library: Option<PathBuf>,
    pub plugins: PluginPaths,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginPaths {
    pub action: Option<PathBuf>,
    pub filter: Option<PathBuf>,
    pub lookup: Option<PathBuf>,
}

impl RolePaths {
    /// Load a paths file, resolving relative entries against its directory
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let parsed: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let base = path.parent().unwrap_or(Path::new("."));
        parsed.resolved(base)
    }

    /// Expand `~`/env vars and anchor relative paths at `base`
    pub fn resolved(self, base: &Path) -> Result<Self> {
        let fix = |p: Option<PathBuf>| -> Result<Option<PathBuf>> {
            p.map(|p| resolve_path(&p, base)).transpose()
        };

        Ok(Self {
            roles: fix(self.roles)?,
            library: fix(self.library)?,
            plugins: PluginPaths {
                action: fix(self.plugins.action)?,
                filter: fix(self.plugins.filter)?,
                lookup: fix(self.plugins.lookup)?,
            },
        })
    }

    /// Overlay `other` on top of `self`; entries set in `other` win
    pub fn merge(self, other: RolePaths) -> Self {
        Self {
            roles: other.roles.or(self.roles),
            library: other.library.or(self.library),
            plugins: PluginPaths {
                action: other.plugins.action.or(self.plugins.action),
                filter: other.plugins.filter.or(self.plugins.filter),
                lookup: other.plugins.lookup.or(self.plugins.lookup),
            },
        }
    }

    /// All configured paths with the ansible setting they feed
    pub fn entries(&self) -> Vec<(&'static str, &Path)> {
        [
            ("roles", self.roles.as_deref()),
            ("library", self.library.as_deref()),
            ("action_plugins", self.plugins.action.as_deref()),
            ("filter_plugins", self.plugins.filter.as_deref()),
            ("lookup_plugins", self.plugins.lookup.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, path)| path.map(|p| (key, p)))
        .collect()
    }
}

fn resolve_path(path: &Path, base: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", raw, e)))?;
    let expanded = PathBuf::from(expanded.as_ref());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("paths.toml");
        std::fs::write(
            &path,
            r#"
roles = "roles"
library = "/opt/library"

[plugins]
filter = "plugins/filter"
"#,
        )
        .unwrap();

        let paths = RolePaths::load_from(&path).unwrap();
        assert_eq!(paths.roles, Some(tmp.path().join("roles")));
        assert_eq!(paths.library, Some(PathBuf::from("/opt/library")));
        assert_eq!(paths.plugins.filter, Some(tmp.path().join("plugins/filter")));
        assert_eq!(paths.plugins.action, None);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RolePaths::load_from(&tmp.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("paths.toml");
        std::fs::write(&path, "modules = \"x\"\n").unwrap();
        let err = RolePaths::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
    }

    #[test]
    fn test_merge_prefers_other() {
        let cli = RolePaths {
            roles: Some(PathBuf::from("/cli/roles")),
            library: Some(PathBuf::from("/cli/library")),
            ..Default::default()
        };
        let file = RolePaths {
            roles: Some(PathBuf::from("/file/roles")),
            plugins: PluginPaths {
                lookup: Some(PathBuf::from("/file/lookup")),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = cli.merge(file);
        assert_eq!(merged.roles, Some(PathBuf::from("/file/roles")));
        assert_eq!(merged.library, Some(PathBuf::from("/cli/library")));
        assert_eq!(merged.plugins.lookup, Some(PathBuf::from("/file/lookup")));
    }

    #[test]
    fn test_entries_skip_unset() {
        let paths = RolePaths {
            library: Some(PathBuf::from("/lib")),
            plugins: PluginPaths {
                action: Some(PathBuf::from("/act")),
                ..Default::default()
            },
            ..Default::default()
        };
        let entries = paths.entries();
        assert_eq!(
            entries,
            vec![
                ("library", Path::new("/lib")),
                ("action_plugins", Path::new("/act")),
            ]
        );
    }
}
