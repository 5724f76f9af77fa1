use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error(
        "No listening history files found. Upload .json files, or a .zip containing a \"{folder}\" folder with files named \"{prefix}*.json\"."
    )]
    NoTasks { folder: String, prefix: String },

    #[error("Failed to open archive {name}: {reason}")]
    Archive { name: String, reason: String },

    #[error("Failed to read {name}: {reason}")]
    Read { name: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("failed to persist listening history: {0}")]
    Persist(String),

    #[error("failed to load your saved listening history: {0}")]
    Load(String),

    #[error("failed to clear existing data: {0}")]
    Clear(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StoreError {
    pub(crate) fn persist(err: anyhow::Error) -> Self {
        Self::Persist(format!("{err:#}"))
    }

    pub(crate) fn load(err: anyhow::Error) -> Self {
        Self::Load(format!("{err:#}"))
    }

    pub(crate) fn clear(err: anyhow::Error) -> Self {
        Self::Clear(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tasks_message_names_expected_layout() {
        let err = IngestError::NoTasks {
            folder: String::from("Spotify Extended Streaming History"),
            prefix: String::from("Streaming_History_Audio_"),
        };
        let message = err.to_string();
        assert!(message.contains("Spotify Extended Streaming History"));
        assert!(message.contains("Streaming_History_Audio_*.json"));
    }

    #[test]
    fn store_errors_keep_context_chain() {
        let err = anyhow::anyhow!("disk full").context("failed to write history.json");
        let store = StoreError::persist(err);
        assert_eq!(
            store.to_string(),
            "failed to persist listening history: failed to write history.json: disk full"
        );
    }
}
