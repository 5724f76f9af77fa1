use crate::config::ExplorerConfig;
use crate::error::{ImportError, StoreError};
use crate::extract::SourceFile;
use crate::ingest::{self, IngestProgress, Ingestion};
use crate::model::Play;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub trait PlayStore: Send {
    fn clear(&mut self) -> Result<()>;
    fn add_all(&mut self, plays: &[Play]) -> Result<()>;
    fn get_all(&self) -> Result<Vec<Play>>;
    fn count(&self) -> Result<usize>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    plays: Vec<Play>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayStore for MemoryStore {
    fn clear(&mut self) -> Result<()> {
        self.plays.clear();
        Ok(())
    }

    fn add_all(&mut self, plays: &[Play]) -> Result<()> {
        self.plays.extend_from_slice(plays);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Play>> {
        Ok(self.plays.clone())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.plays.len())
    }
}

const HISTORY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredHistory {
    #[serde(default = "default_history_version")]
    version: u32,
    #[serde(default)]
    plays: Vec<Play>,
}

fn default_history_version() -> u32 {
    HISTORY_FORMAT_VERSION
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    plays: Vec<Play>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let plays = load_history_from_path(&path)?;
        log::debug!("opened history store {} with {} plays", path.display(), plays.len());
        Ok(Self { path, plays })
    }

    pub fn open_default() -> Result<Self> {
        crate::config::ensure_config_dir()?;
        Self::open(crate::config::history_path()?)
    }

    fn flush(&self) -> Result<()> {
        save_history_to_path(&self.path, &self.plays)
    }
}

impl PlayStore for JsonFileStore {
    fn clear(&mut self) -> Result<()> {
        self.plays.clear();
        self.flush()
    }

    fn add_all(&mut self, plays: &[Play]) -> Result<()> {
        self.plays.extend_from_slice(plays);
        self.flush()
    }

    fn get_all(&self) -> Result<Vec<Play>> {
        Ok(self.plays.clone())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.plays.len())
    }
}

fn load_history_from_path(path: &Path) -> Result<Vec<Play>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    let stored: StoredHistory = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse history file {}", path.display()))?;
    Ok(stored.plays)
}

fn save_history_to_path(path: &Path, plays: &[Play]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if path.exists() {
        let backup = path.with_extension("json.bak");
        if let Err(err) = fs::copy(path, &backup) {
            log::warn!("could not back up {}: {err}", path.display());
        }
    }
    let stored = StoredHistory {
        version: HISTORY_FORMAT_VERSION,
        plays: plays.to_vec(),
    };
    let json = serde_json::to_string_pretty(&stored)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub struct HistoryService<S: PlayStore> {
    store: S,
    config: ExplorerConfig,
}

impl<S: PlayStore> HistoryService<S> {
    pub fn new(store: S, config: ExplorerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn import(&mut self, files: &[SourceFile]) -> Result<Ingestion, ImportError> {
        self.import_with_progress(files, |_| {})
    }

    /// Ingests `files`, then replaces the stored history with the result. Nothing is cleared
    /// when ingestion fails.
    pub fn import_with_progress<F>(
        &mut self,
        files: &[SourceFile],
        on_progress: F,
    ) -> Result<Ingestion, ImportError>
    where
        F: FnMut(IngestProgress),
    {
        let ingestion = ingest::ingest_with_progress(files, &self.config, on_progress)?;
        self.replace_all(&ingestion.plays)?;
        Ok(ingestion)
    }

    fn replace_all(&mut self, plays: &[Play]) -> Result<(), StoreError> {
        self.store.clear().map_err(StoreError::clear)?;
        let chunk_size = self.config.store_chunk_size.max(1);
        for chunk in plays.chunks(chunk_size) {
            self.store.add_all(chunk).map_err(StoreError::persist)?;
        }
        log::info!(
            "persisted {} plays in chunks of {chunk_size}",
            plays.len()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<Play>, StoreError> {
        if self.store.count().map_err(StoreError::load)? == 0 {
            return Ok(Vec::new());
        }
        let mut plays = self.store.get_all().map_err(StoreError::load)?;
        plays.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(plays)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear().map_err(StoreError::clear)
    }

    pub fn has_data(&self) -> bool {
        match self.store.count() {
            Ok(count) => count > 0,
            Err(err) => {
                log::warn!("failed to check for existing history: {err:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use tempfile::tempdir;

    fn play(ts: &str, track: &str) -> Play {
        Play {
            id: format!("{ts}-0"),
            timestamp: ts.to_string(),
            ms_played: 1_000,
            track_name: Some(track.to_string()),
            artist_name: Some(String::from("Artist")),
            album_name: None,
            track_uri: None,
            source: String::from("test.json"),
        }
    }

    fn upload(body: &str) -> Vec<SourceFile> {
        vec![SourceFile::new("history.json", body.as_bytes().to_vec())]
    }

    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        chunks: Vec<usize>,
        fail_count: bool,
        fail_add: bool,
    }

    impl PlayStore for RecordingStore {
        fn clear(&mut self) -> Result<()> {
            self.chunks.clear();
            self.inner.clear()
        }

        fn add_all(&mut self, plays: &[Play]) -> Result<()> {
            if self.fail_add {
                anyhow::bail!("quota exceeded");
            }
            self.chunks.push(plays.len());
            self.inner.add_all(plays)
        }

        fn get_all(&self) -> Result<Vec<Play>> {
            self.inner.get_all()
        }

        fn count(&self) -> Result<usize> {
            if self.fail_count {
                anyhow::bail!("database closed");
            }
            self.inner.count()
        }
    }

    #[test]
    fn import_persists_in_configured_chunks() {
        let config = ExplorerConfig {
            store_chunk_size: 2,
            ..ExplorerConfig::default()
        };
        let mut service = HistoryService::new(RecordingStore::default(), config);
        let body = r#"[
            {"ts":"2024-01-01T00:00:00Z"},
            {"ts":"2024-01-02T00:00:00Z"},
            {"ts":"2024-01-03T00:00:00Z"},
            {"ts":"2024-01-04T00:00:00Z"},
            {"ts":"2024-01-05T00:00:00Z"}
        ]"#;

        let ingestion = service.import(&upload(body)).expect("import");
        assert_eq!(ingestion.plays.len(), 5);
        assert_eq!(service.store().chunks, vec![2, 2, 1]);
        assert!(service.has_data());
    }

    #[test]
    fn import_replaces_previous_history() {
        let mut service = HistoryService::new(MemoryStore::new(), ExplorerConfig::default());
        service
            .import(&upload(r#"[{"ts":"2023-01-01T00:00:00Z"},{"ts":"2023-01-02T00:00:00Z"}]"#))
            .expect("first import");
        service
            .import(&upload(r#"[{"ts":"2024-01-01T00:00:00Z"}]"#))
            .expect("second import");
        assert_eq!(service.load().expect("load").len(), 1);
    }

    #[test]
    fn failed_ingestion_leaves_store_untouched() {
        let mut service = HistoryService::new(MemoryStore::new(), ExplorerConfig::default());
        service
            .import(&upload(r#"[{"ts":"2023-01-01T00:00:00Z"}]"#))
            .expect("import");

        let err = service
            .import(&[SourceFile::new("notes.txt", b"hi".to_vec())])
            .expect_err("no tasks");
        assert!(matches!(err, ImportError::Ingest(IngestError::NoTasks { .. })));
        assert!(service.has_data());
    }

    #[test]
    fn store_failures_map_to_store_errors() {
        let store = RecordingStore {
            fail_add: true,
            ..RecordingStore::default()
        };
        let mut service = HistoryService::new(store, ExplorerConfig::default());
        let err = service
            .import(&upload(r#"[{"ts":"2023-01-01T00:00:00Z"}]"#))
            .expect_err("persist");
        assert!(matches!(err, ImportError::Store(StoreError::Persist(_))));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn has_data_is_false_when_store_check_fails() {
        let store = RecordingStore {
            fail_count: true,
            ..RecordingStore::default()
        };
        let service = HistoryService::new(store, ExplorerConfig::default());
        assert!(!service.has_data());
        assert!(matches!(service.load(), Err(StoreError::Load(_))));
    }

    #[test]
    fn load_returns_newest_first() {
        let mut store = MemoryStore::new();
        store
            .add_all(&[
                play("2024-01-02T00:00:00Z", "b"),
                play("2024-01-03T00:00:00Z", "c"),
                play("2024-01-01T00:00:00Z", "a"),
            ])
            .expect("add");
        let service = HistoryService::new(store, ExplorerConfig::default());
        let tracks: Vec<String> = service
            .load()
            .expect("load")
            .iter()
            .map(|p| p.track().to_string())
            .collect();
        assert_eq!(tracks, vec!["c", "b", "a"]);
    }

    #[test]
    fn json_file_store_survives_reopen_and_keeps_backup() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("history.json");

        let mut store = JsonFileStore::open(&path).expect("open");
        assert_eq!(store.count().expect("count"), 0);
        store.add_all(&[play("2024-01-01T00:00:00Z", "a")]).expect("add");
        store.add_all(&[play("2024-01-02T00:00:00Z", "b")]).expect("add");

        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(reopened.count().expect("count"), 2);
        assert_eq!(reopened.get_all().expect("all")[1].track(), "b");
        assert!(path.with_extension("json.bak").exists());

        let mut cleared = reopened;
        cleared.clear().expect("clear");
        assert_eq!(JsonFileStore::open(&path).expect("reopen").count().expect("count"), 0);
    }

    #[test]
    fn corrupt_history_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").expect("write");
        let err = JsonFileStore::open(&path).expect_err("corrupt");
        assert!(format!("{err:#}").contains("failed to parse history file"));
    }
}
