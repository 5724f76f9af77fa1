use crate::model::TimelineGrouping;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::UtcOffset;

const APP_DIR: &str = "streamscope";
const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "history.json";
const CONFIG_DIR_ENV: &str = "STREAMSCOPE_CONFIG_DIR";

pub const DEFAULT_ZIP_FOLDER: &str = "Spotify Extended Streaming History";
pub const DEFAULT_ZIP_FILE_PREFIX: &str = "Streaming_History_Audio_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default = "default_zip_folder")]
    pub zip_folder: String,
    #[serde(default = "default_zip_file_prefix")]
    pub zip_file_prefix: String,
    #[serde(default = "default_top_entities_limit")]
    pub top_entities_limit: usize,
    #[serde(default = "default_store_chunk_size")]
    pub store_chunk_size: usize,
    #[serde(default)]
    pub timeline_grouping: TimelineGrouping,
    #[serde(default)]
    pub utc_offset_minutes: Option<i16>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_zip_folder() -> String {
    String::from(DEFAULT_ZIP_FOLDER)
}

fn default_zip_file_prefix() -> String {
    String::from(DEFAULT_ZIP_FILE_PREFIX)
}

fn default_top_entities_limit() -> usize {
    10
}

fn default_store_chunk_size() -> usize {
    2_000
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            zip_folder: default_zip_folder(),
            zip_file_prefix: default_zip_file_prefix(),
            top_entities_limit: default_top_entities_limit(),
            store_chunk_size: default_store_chunk_size(),
            timeline_grouping: TimelineGrouping::default(),
            utc_offset_minutes: None,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl ExplorerConfig {
    pub fn utc_offset(&self) -> UtcOffset {
        match self.utc_offset_minutes {
            Some(minutes) => UtcOffset::from_whole_seconds(i32::from(minutes) * 60)
                .unwrap_or(UtcOffset::UTC),
            None => UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE))
}

pub fn history_path() -> Result<PathBuf> {
    Ok(config_root()?.join(HISTORY_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_config() -> Result<ExplorerConfig> {
    let path = config_path()?;
    load_config_from_path(&path)
}

pub fn save_config(config: &ExplorerConfig) -> Result<()> {
    ensure_config_dir()?;
    let path = config_path()?;
    save_config_to_path(&path, config)
}

pub fn load_config_from_path(path: &Path) -> Result<ExplorerConfig> {
    if !path.exists() {
        return Ok(ExplorerConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: ExplorerConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn save_config_to_path(path: &Path, config: &ExplorerConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, PlayStore};
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        unsafe {
            env::set_var(CONFIG_DIR_ENV, dir.path().to_string_lossy().as_ref());
        }

        let config = ExplorerConfig {
            top_entities_limit: 25,
            timeline_grouping: TimelineGrouping::Month,
            ..ExplorerConfig::default()
        };
        save_config(&config).expect("save");
        let loaded = load_config().expect("load");
        assert_eq!(loaded.top_entities_limit, 25);
        assert_eq!(loaded.timeline_grouping, TimelineGrouping::Month);
        assert_eq!(history_path().expect("path"), dir.path().join(HISTORY_FILE));

        let mut store = JsonFileStore::open_default().expect("open history");
        assert_eq!(store.count().expect("count"), 0);
        store.clear().expect("clear");
        assert!(dir.path().join(HISTORY_FILE).exists());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "top_entities_limit": 3 }"#).expect("write");

        let loaded = load_config_from_path(&path).expect("load");
        assert_eq!(loaded.top_entities_limit, 3);
        assert_eq!(loaded.zip_folder, DEFAULT_ZIP_FOLDER);
        assert_eq!(loaded.store_chunk_size, 2_000);
    }

    #[test]
    fn fixed_offset_overrides_local_offset() {
        let config = ExplorerConfig {
            utc_offset_minutes: Some(-300),
            ..ExplorerConfig::default()
        };
        assert_eq!(config.utc_offset().whole_minutes(), -300);
    }
}
