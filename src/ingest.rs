use crate::config::ExplorerConfig;
use crate::error::IngestError;
use crate::extract::{self, ParseTask, SourceFile, push_warning};
use crate::model::Play;
use crate::normalize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestProgress {
    pub progress: u8,
    pub current_file: String,
    pub message: String,
    pub processed_count: usize,
    pub total_count: usize,
}

impl IngestProgress {
    fn new(task: &ParseTask, processed: usize, total: usize, message: String) -> Self {
        let progress = if total == 0 {
            100
        } else {
            ((processed as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            progress,
            current_file: task.name.clone(),
            message,
            processed_count: processed,
            total_count: total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingestion {
    /// Ascending by timestamp; ties keep discovery order.
    pub plays: Vec<Play>,
    pub warnings: Vec<String>,
    pub skipped: usize,
}

pub fn ingest(files: &[SourceFile], config: &ExplorerConfig) -> Result<Ingestion, IngestError> {
    ingest_with_progress(files, config, |_| {})
}

pub fn ingest_with_progress<F>(
    files: &[SourceFile],
    config: &ExplorerConfig,
    mut on_progress: F,
) -> Result<Ingestion, IngestError>
where
    F: FnMut(IngestProgress),
{
    let extract::Extraction {
        tasks,
        mut warnings,
    } = extract::extract(files, config)?;

    let total = tasks.len();
    let mut plays = Vec::new();
    let mut skipped = 0_usize;

    for (processed, task) in tasks.iter().enumerate() {
        on_progress(IngestProgress::new(
            task,
            processed,
            total,
            format!("Parsing {}…", task.name),
        ));

        match parse_task(task) {
            Ok(batch) => {
                log::debug!(
                    "{} yielded {} plays ({} skipped)",
                    task.name,
                    batch.plays.len(),
                    batch.skipped
                );
                skipped = skipped.saturating_add(batch.skipped);
                plays.extend(batch.plays);
            }
            Err(reason) => {
                push_warning(
                    &mut warnings,
                    format!("Failed to parse {}: {reason}", task.name),
                );
            }
        }

        on_progress(IngestProgress::new(
            task,
            processed + 1,
            total,
            format!("Finished {}", task.name),
        ));
    }

    plays.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    log::info!(
        "ingested {} plays from {total} tasks ({} warnings, {skipped} entries skipped)",
        plays.len(),
        warnings.len()
    );

    Ok(Ingestion {
        plays,
        warnings,
        skipped,
    })
}

struct TaskBatch {
    plays: Vec<Play>,
    skipped: usize,
}

fn parse_task(task: &ParseTask) -> Result<TaskBatch, String> {
    let text = task.text()?;
    let parsed: Value = serde_json::from_str(text).map_err(|err| err.to_string())?;
    let Value::Array(entries) = parsed else {
        return Err(String::from("JSON content must be an array"));
    };

    let mut plays = Vec::with_capacity(entries.len());
    let mut skipped = 0_usize;
    for (ordinal, entry) in entries.iter().enumerate() {
        match normalize::normalize_value(entry, &task.name, ordinal) {
            Some(play) => plays.push(play),
            None => skipped += 1,
        }
    }
    Ok(TaskBatch { plays, skipped })
}
