use serde::{Deserialize, Serialize};

pub type RawEntry = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    pub id: String,
    pub timestamp: String,
    pub ms_played: u64,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub track_uri: Option<String>,
    pub source: String,
}

impl Play {
    pub fn track(&self) -> &str {
        self.track_name.as_deref().unwrap_or_default()
    }

    pub fn artist(&self) -> &str {
        self.artist_name.as_deref().unwrap_or_default()
    }

    pub fn album(&self) -> &str {
        self.album_name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    General,
    Exact,
    Track,
    Artist,
    Album,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub scope: SearchScope,
    pub value: String,
    pub exact_word_boundary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Timestamp,
    Duration,
    TrackName,
    ArtistName,
    AlbumName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Timestamp,
            direction: SortDirection::Descending,
        }
    }
}

impl SortSpec {
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            Self {
                field,
                direction: self.direction.toggle(),
            }
        } else {
            Self {
                field,
                direction: SortDirection::Ascending,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimelineGrouping {
    Day,
    #[default]
    Week,
    Month,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayFilters {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_toggle_flips_same_field_and_resets_new_field() {
        let sort = SortSpec::default();
        assert_eq!(sort.field, SortField::Timestamp);
        assert_eq!(sort.direction, SortDirection::Descending);

        let flipped = sort.toggle(SortField::Timestamp);
        assert_eq!(flipped.direction, SortDirection::Ascending);

        let by_track = flipped.toggle(SortField::TrackName);
        assert_eq!(by_track.field, SortField::TrackName);
        assert_eq!(by_track.direction, SortDirection::Ascending);
        assert_eq!(
            by_track.toggle(SortField::TrackName).direction,
            SortDirection::Descending
        );
    }

    #[test]
    fn play_serializes_with_camel_case_keys() {
        let play = Play {
            id: String::from("2024-01-01T00:00:00Z-0"),
            timestamp: String::from("2024-01-01T00:00:00Z"),
            ms_played: 1_000,
            track_name: Some(String::from("Song")),
            artist_name: None,
            album_name: None,
            track_uri: None,
            source: String::from("a.json"),
        };
        let value = serde_json::to_value(&play).expect("serialize");
        assert_eq!(value["msPlayed"], 1_000);
        assert_eq!(value["trackName"], "Song");
        assert!(value["artistName"].is_null());
    }
}
