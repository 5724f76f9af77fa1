use crate::format;
use crate::model::Play;
use crate::stats::{AggregateStats, OverviewStats, TimelinePoint, TopEntity};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CSV_HEADER: [&str; 7] = [
    "Timestamp",
    "Track",
    "Artist",
    "Album",
    "Milliseconds Played",
    "Identifier",
    "Source",
];

pub fn csv_rows(plays: &[Play]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(plays.len() + 1);
    rows.push(CSV_HEADER.iter().map(|cell| cell.to_string()).collect());
    rows.extend(plays.iter().map(|play| {
        vec![
            play.timestamp.clone(),
            play.track().to_string(),
            play.artist().to_string(),
            play.album().to_string(),
            play.ms_played.to_string(),
            play.track_uri.clone().unwrap_or_default(),
            play.source.clone(),
        ]
    }));
    rows
}

fn escape_csv(value: &str) -> String {
    let escaped = value.replace('"', "\"\"");
    if value.contains([',', '"', '\n']) {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

pub fn to_csv(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| escape_csv(cell))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn save_csv(path: &Path, plays: &[Play]) -> Result<()> {
    let body = to_csv(&csv_rows(plays));
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("exported {} plays to {}", plays.len(), path.display());
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub plays: Vec<Play>,
    pub overview: OverviewStats,
    pub top_tracks: Vec<TopEntity>,
    pub top_artists: Vec<TopEntity>,
    pub timeline: Vec<TimelinePoint>,
}

impl ExportBundle {
    pub fn new(plays: Vec<Play>, stats: &AggregateStats) -> Self {
        Self {
            plays,
            overview: stats.overview.clone(),
            top_tracks: stats.top_tracks.clone(),
            top_artists: stats.top_artists.clone(),
            timeline: stats.timeline.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize export bundle")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("exported summary of {} plays to {}", self.plays.len(), path.display());
        Ok(())
    }
}

pub fn describe_overview(overview: &OverviewStats) -> Vec<(&'static str, String)> {
    vec![
        ("Total plays", format::format_number(overview.total_plays as u64)),
        ("Unique tracks", format::format_number(overview.unique_tracks as u64)),
        ("Unique artists", format::format_number(overview.unique_artists as u64)),
        ("Total time", format::format_duration(overview.total_ms_played)),
        ("Average play length", format::format_minutes(overview.average_ms_played)),
    ]
}
