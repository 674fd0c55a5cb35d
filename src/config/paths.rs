//! Where automacro keeps its files.
//!
//! Everything lives under `~/.automacro/`: `config.yaml` holds settings and
//! `macros.json` is the document used when none is given.

use std::path::PathBuf;

use crate::error::AutomacroError;

/// Locations of the settings file and the default document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub document: PathBuf,
}

impl Paths {
    /// Paths under `$HOME/.automacro`.
    ///
    /// # Errors
    ///
    /// Returns `AutomacroError::Config` if `HOME` is unset.
    pub fn new() -> Result<Self, AutomacroError> {
        std::env::var_os("HOME")
            .map(|home| Self::with_root(PathBuf::from(home).join(".automacro")))
            .ok_or_else(|| AutomacroError::Config("HOME is not set".into()))
    }

    /// Paths under an arbitrary root.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            document: root.join("macros.json"),
            root,
        }
    }
}

impl Default for Paths {
    /// Falls back to `./.automacro` without a home directory.
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_root(PathBuf::from(".automacro")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let paths = Paths::with_root(PathBuf::from("/srv/automacro"));
        assert_eq!(paths.root, PathBuf::from("/srv/automacro"));
        assert_eq!(paths.config_file, PathBuf::from("/srv/automacro/config.yaml"));
        assert_eq!(paths.document, PathBuf::from("/srv/automacro/macros.json"));
    }

    #[test]
    fn test_default_ends_in_dot_dir() {
        assert!(Paths::default().root.ends_with(".automacro"));
    }
}
