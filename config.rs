use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bounds for the display-handle cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_object_handles")]
    pub max_object_handles: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_object_handles: default_max_object_handles(),
        }
    }
}

fn default_max_object_handles() -> usize {
    100
}

/// Thumbnail rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    pub max_source_bytes: u64,
    pub width: u32,
    pub height: u32,
    /// JPEG encode quality, 0.0 to 1.0.
    pub quality: f32,
    #[serde(default = "default_max_concurrent_renders")]
    pub max_concurrent_renders: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 50 * 1024 * 1024,
            width: 300,
            height: 300,
            quality: 0.8,
            max_concurrent_renders: default_max_concurrent_renders(),
        }
    }
}

fn default_max_concurrent_renders() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
}

impl Settings {
    /// Loads settings from a JSON file, falling back to defaults if absent.
    pub fn load(path: &Path) -> Result<Self, crate::error::Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), crate::error::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
}

impl AppPaths {
    /// Resolves the application data directory, creating it on first run.
    /// An explicit override takes precedence over the platform default.
    pub fn discover(override_dir: Option<PathBuf>) -> Result<Self, crate::error::Error> {
        let root = match override_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "meme-browser")
                .ok_or_else(|| crate::error::Error::Path("Failed to get app data dir".to_string()))?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            db_path: root.join("library.db"),
            settings_path: root.join("settings.json"),
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.cache.max_object_handles, 100);
        assert_eq!(settings.thumbnails.width, 300);
        assert_eq!(settings.thumbnails.max_concurrent_renders, 3);
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.cache.max_object_handles = 8;
        settings.thumbnails.quality = 0.5;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.cache.max_object_handles, 8);
        assert!((loaded.thumbnails.quality - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn settings_tolerate_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"cache": {}}"#).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.cache.max_object_handles, 100);
        assert_eq!(loaded.thumbnails.height, 300);
    }

    #[test]
    fn app_paths_with_override() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::discover(Some(dir.path().join("data"))).unwrap();
        assert!(paths.root.exists());
        assert_eq!(paths.db_path.file_name().unwrap(), "library.db");
    }
}
