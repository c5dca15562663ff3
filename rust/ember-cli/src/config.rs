//! Configuration file parsing for `ember.toml`.
//!
//! Searches the current directory, then its ancestors. A missing file means
//! defaults everywhere.

use ember_rt::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FILE_NAME: &str = "ember.toml";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct EmberConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub boot: BootSection,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct BootSection {
    /// Prebuilt core image to boot from instead of the compiled-in bootstrap.
    /// Relative paths are resolved against the directory of `ember.toml`.
    pub image: Option<PathBuf>,
}

impl EmberConfig {
    /// Load config from `ember.toml`, searching current dir then parents.
    pub fn load() -> Result<Self, String> {
        match Self::find() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file path, resolving the image path
    /// against the file's directory.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let mut cfg: Self = toml::from_str(&content)
            .map_err(|e| format!("invalid toml in '{}': {}", path.display(), e))?;
        if let (Some(image), Some(dir)) = (cfg.boot.image.as_mut(), path.parent()) {
            if image.is_relative() {
                *image = dir.join(&*image);
            }
        }
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    fn find() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let candidate = dir.join(FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[runtime]
max_call_depth = 256
gc_interval = 4096

[boot]
image = "build/core.image"
"#;
        let cfg: EmberConfig = toml::from_str(toml_str).expect("should parse");
        assert_eq!(cfg.runtime.max_call_depth, 256);
        assert_eq!(cfg.runtime.gc_interval, 4096);
        assert_eq!(cfg.runtime.max_fiber_depth, 64);
        assert_eq!(cfg.boot.image, Some(PathBuf::from("build/core.image")));
    }

    #[test]
    fn empty_string_returns_default() {
        let cfg: EmberConfig = toml::from_str("").expect("empty toml is valid");
        assert_eq!(cfg, EmberConfig::default());
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result: Result<EmberConfig, _> = toml::from_str("[broken");
        assert!(result.is_err());
    }

    #[test]
    fn relative_image_is_resolved_against_config_dir() {
        let dir = std::env::temp_dir().join(format!("ember-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(FILE_NAME);
        std::fs::write(&path, "[boot]\nimage = \"core.image\"\n").unwrap();
        let cfg = EmberConfig::load_from(&path).unwrap();
        assert_eq!(cfg.boot.image, Some(dir.join("core.image")));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = EmberConfig::load_from(Path::new("/nonexistent/ember.toml")).unwrap_err();
        assert!(err.contains("cannot read"));
    }
}
