use crate::config::ExplorerConfig;
use crate::format;
use crate::model::{Play, PlayFilters, SortSpec, TimelineGrouping};
use crate::search::QueryMatcher;
use crate::view;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset, Weekday};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const UNKNOWN_TRACK: &str = "Unknown track";
pub const PLACEHOLDER_NAME: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsOptions {
    pub top_limit: usize,
    pub grouping: TimelineGrouping,
    pub offset: UtcOffset,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            top_limit: 10,
            grouping: TimelineGrouping::default(),
            offset: UtcOffset::UTC,
        }
    }
}

impl StatsOptions {
    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self {
            top_limit: config.top_entities_limit,
            grouping: config.timeline_grouping,
            offset: config.utc_offset(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Track,
    Artist,
    Album,
}

impl Dimension {
    fn value(self, play: &Play) -> Option<&str> {
        match self {
            Self::Track => play.track_name.as_deref(),
            Self::Artist => play.artist_name.as_deref(),
            Self::Album => play.album_name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_plays: usize,
    pub unique_tracks: usize,
    pub unique_artists: usize,
    pub total_ms_played: u64,
    pub average_ms_played: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopEntity {
    pub name: String,
    pub count: usize,
    pub ms_played: u64,
    pub percentage: f64,
    pub sample_track: Play,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCount {
    pub key: String,
    pub plays: usize,
    pub ms_played: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBreakdown {
    pub by_weekday: Vec<BucketCount>,
    pub by_hour: Vec<BucketCount>,
    pub by_day: Vec<BucketCount>,
    pub busiest_weekday: Option<BucketCount>,
    pub busiest_hour: Option<BucketCount>,
    pub busiest_day: Option<BucketCount>,
    pub average_plays_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub start: String,
    pub end: String,
    pub length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub longest_streak: usize,
    /// Length of the streak ending on the latest date in the data, not on today.
    pub current_streak: usize,
    pub streaks: Vec<Streak>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTopTrack {
    pub month: String,
    pub track_name: String,
    pub artist_name: Option<String>,
    pub play_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub bucket: String,
    pub label: String,
    pub plays: usize,
    pub ms_played: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub overview: OverviewStats,
    pub top_tracks: Vec<TopEntity>,
    pub top_artists: Vec<TopEntity>,
    pub top_albums: Vec<TopEntity>,
    pub activity: ActivityBreakdown,
    pub listening_streak: StreakSummary,
    pub monthly_top_tracks: Vec<MonthlyTopTrack>,
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopName {
    pub name: String,
    pub plays: usize,
}

impl TopName {
    fn placeholder() -> Self {
        Self {
            name: String::from(PLACEHOLDER_NAME),
            plays: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayStatistics {
    pub total_playtime: String,
    pub unique_tracks: usize,
    pub unique_artists: usize,
    pub average_playtime: String,
    pub top_artist: TopName,
    pub top_track: TopName,
    pub top_album: TopName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    #[serde(default)]
    pub filters: PlayFilters,
    #[serde(default)]
    pub grouping: TimelineGrouping,
    #[serde(default)]
    pub sort: SortSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub filtered_plays: Vec<Play>,
    #[serde(flatten)]
    pub stats: AggregateStats,
}

struct Bucket<K> {
    key: K,
    plays: usize,
    ms_played: u64,
}

/// Insertion-ordered group counter. Peaks use strict greater-than, so the first bucket to
/// reach a count keeps the lead on ties.
struct Tally<K> {
    slots: HashMap<K, usize>,
    buckets: Vec<Bucket<K>>,
}

impl<K: Eq + Hash + Clone> Tally<K> {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    fn add(&mut self, key: K, ms_played: u64) -> (usize, bool) {
        let (slot, created) = match self.slots.get(&key) {
            Some(slot) => (*slot, false),
            None => {
                let slot = self.buckets.len();
                self.slots.insert(key.clone(), slot);
                self.buckets.push(Bucket {
                    key,
                    plays: 0,
                    ms_played: 0,
                });
                (slot, true)
            }
        };
        let bucket = &mut self.buckets[slot];
        bucket.plays += 1;
        bucket.ms_played = bucket.ms_played.saturating_add(ms_played);
        (slot, created)
    }

    fn peak(&self) -> Option<&Bucket<K>> {
        self.peak_slot().map(|slot| &self.buckets[slot])
    }

    fn peak_slot(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (slot, bucket) in self.buckets.iter().enumerate() {
            if best.is_none_or(|current| bucket.plays > self.buckets[current].plays) {
                best = Some(slot);
            }
        }
        best
    }
}

pub fn parse_timestamp(timestamp: &str) -> Option<OffsetDateTime> {
    let trimmed = timestamp.trim();
    if let Ok(instant) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(instant);
    }
    Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn local_time(play: &Play, offset: UtcOffset) -> Option<OffsetDateTime> {
    parse_timestamp(&play.timestamp).map(|instant| instant.to_offset(offset))
}

pub fn day_key(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn month_key(date: Date) -> String {
    format!("{:04}-{:02}", date.year(), u8::from(date.month()))
}

pub fn week_key(date: Date) -> String {
    let (year, week, _) = date.to_iso_week_date();
    format!("{year:04}-W{week:02}")
}

pub fn overview(plays: &[Play]) -> OverviewStats {
    let total_plays = plays.len();
    let total_ms_played = plays
        .iter()
        .fold(0_u64, |sum, play| sum.saturating_add(play.ms_played));
    let unique_tracks: HashSet<(&str, Option<&str>)> = plays
        .iter()
        .filter_map(|play| {
            play.track_name
                .as_deref()
                .map(|track| (track, play.artist_name.as_deref()))
        })
        .collect();
    let unique_artists: HashSet<&str> = plays
        .iter()
        .filter_map(|play| play.artist_name.as_deref())
        .collect();

    OverviewStats {
        total_plays,
        unique_tracks: unique_tracks.len(),
        unique_artists: unique_artists.len(),
        total_ms_played,
        average_ms_played: if total_plays == 0 {
            0.0
        } else {
            total_ms_played as f64 / total_plays as f64
        },
    }
}

pub fn top_entities(plays: &[Play], dimension: Dimension, limit: usize) -> Vec<TopEntity> {
    let mut tally = Tally::new();
    let mut samples: Vec<&Play> = Vec::new();
    for play in plays {
        let name = dimension.value(play).unwrap_or(UNKNOWN_NAME);
        let (_, created) = tally.add(name, play.ms_played);
        if created {
            samples.push(play);
        }
    }

    let grand_total = plays.len().max(1) as f64;
    let mut entities: Vec<TopEntity> = tally
        .buckets
        .iter()
        .zip(samples)
        .map(|(bucket, sample)| TopEntity {
            name: bucket.key.to_string(),
            count: bucket.plays,
            ms_played: bucket.ms_played,
            percentage: bucket.plays as f64 / grand_total * 100.0,
            sample_track: sample.clone(),
        })
        .collect();
    entities.sort_by(|a, b| b.count.cmp(&a.count));
    entities.truncate(limit);
    entities
}

fn to_bucket_count(bucket: &Bucket<String>) -> BucketCount {
    BucketCount {
        key: bucket.key.clone(),
        plays: bucket.plays,
        ms_played: bucket.ms_played,
    }
}

pub fn activity(plays: &[Play], offset: UtcOffset) -> ActivityBreakdown {
    let mut weekdays: Tally<String> = Tally::new();
    let mut hours: Tally<String> = Tally::new();
    let mut days: Tally<String> = Tally::new();
    let mut weekday_order: HashMap<String, u8> = HashMap::new();

    for play in plays {
        let Some(local) = local_time(play, offset) else {
            continue;
        };
        let weekday: Weekday = local.weekday();
        let weekday_name = weekday.to_string();
        weekday_order
            .entry(weekday_name.clone())
            .or_insert(weekday.number_days_from_monday());
        weekdays.add(weekday_name, play.ms_played);
        hours.add(format!("{:02}", local.hour()), play.ms_played);
        days.add(day_key(local.date()), play.ms_played);
    }

    let busiest_weekday = weekdays.peak().map(to_bucket_count);
    let busiest_hour = hours.peak().map(to_bucket_count);
    let busiest_day = days.peak().map(to_bucket_count);

    let mut by_weekday: Vec<BucketCount> = weekdays.buckets.iter().map(to_bucket_count).collect();
    by_weekday.sort_by_key(|bucket| weekday_order.get(&bucket.key).copied().unwrap_or(u8::MAX));
    let mut by_hour: Vec<BucketCount> = hours.buckets.iter().map(to_bucket_count).collect();
    by_hour.sort_by(|a, b| a.key.cmp(&b.key));
    let mut by_day: Vec<BucketCount> = days.buckets.iter().map(to_bucket_count).collect();
    by_day.sort_by(|a, b| a.key.cmp(&b.key));

    let average_plays_per_day = if by_day.is_empty() {
        0.0
    } else {
        plays.len() as f64 / by_day.len() as f64
    };

    ActivityBreakdown {
        by_weekday,
        by_hour,
        by_day,
        busiest_weekday,
        busiest_hour,
        busiest_day,
        average_plays_per_day,
    }
}

pub fn listening_streaks(plays: &[Play], offset: UtcOffset) -> StreakSummary {
    let days: BTreeSet<Date> = plays
        .iter()
        .filter_map(|play| local_time(play, offset))
        .map(|local| local.date())
        .collect();

    let mut ordered = days.into_iter();
    let Some(first) = ordered.next() else {
        return StreakSummary::default();
    };

    let mut streaks = Vec::new();
    let mut start = first;
    let mut previous = first;
    let mut length = 1_usize;
    for day in ordered {
        if (day - previous).whole_days() == 1 {
            length += 1;
        } else {
            streaks.push(Streak {
                start: day_key(start),
                end: day_key(previous),
                length,
            });
            start = day;
            length = 1;
        }
        previous = day;
    }
    streaks.push(Streak {
        start: day_key(start),
        end: day_key(previous),
        length,
    });

    let longest_streak = streaks.iter().map(|streak| streak.length).max().unwrap_or(0);
    let current_streak = streaks.last().map_or(0, |streak| streak.length);
    StreakSummary {
        longest_streak,
        current_streak,
        streaks,
    }
}

pub fn monthly_top_tracks(plays: &[Play], offset: UtcOffset) -> Vec<MonthlyTopTrack> {
    let mut months: BTreeMap<String, (Tally<&str>, Vec<Option<&str>>)> = BTreeMap::new();
    for play in plays {
        let Some(local) = local_time(play, offset) else {
            continue;
        };
        let (tally, artists) = months
            .entry(month_key(local.date()))
            .or_insert_with(|| (Tally::new(), Vec::new()));
        let track = play.track_name.as_deref().unwrap_or(UNKNOWN_TRACK);
        let (slot, created) = tally.add(track, play.ms_played);
        if created {
            artists.push(play.artist_name.as_deref());
        } else if artists[slot].is_none() {
            artists[slot] = play.artist_name.as_deref();
        }
    }

    months
        .into_iter()
        .rev()
        .filter_map(|(month, (tally, artists))| {
            let slot = tally.peak_slot()?;
            let winner = &tally.buckets[slot];
            Some(MonthlyTopTrack {
                month,
                track_name: winner.key.to_string(),
                artist_name: artists[slot].map(str::to_string),
                play_count: winner.plays,
            })
        })
        .collect()
}

pub fn timeline(plays: &[Play], grouping: TimelineGrouping, offset: UtcOffset) -> Vec<TimelinePoint> {
    let mut points: BTreeMap<String, TimelinePoint> = BTreeMap::new();
    for play in plays {
        let Some(local) = local_time(play, offset) else {
            continue;
        };
        let date = local.date();
        let bucket = match grouping {
            TimelineGrouping::Day => day_key(date),
            TimelineGrouping::Week => week_key(date),
            TimelineGrouping::Month => month_key(date),
        };
        let point = points.entry(bucket).or_insert_with_key(|bucket| TimelinePoint {
            bucket: bucket.clone(),
            label: bucket_label(date, grouping),
            plays: 0,
            ms_played: 0,
        });
        point.plays += 1;
        point.ms_played = point.ms_played.saturating_add(play.ms_played);
    }
    points.into_values().collect()
}

fn bucket_label(date: Date, grouping: TimelineGrouping) -> String {
    match grouping {
        TimelineGrouping::Day => day_key(date),
        TimelineGrouping::Week => {
            let (year, week, _) = date.to_iso_week_date();
            format!("Week {week}, {year}")
        }
        TimelineGrouping::Month => format!("{} {}", date.month(), date.year()),
    }
}

pub fn compute(plays: &[Play], options: &StatsOptions) -> AggregateStats {
    AggregateStats {
        overview: overview(plays),
        top_tracks: top_entities(plays, Dimension::Track, options.top_limit),
        top_artists: top_entities(plays, Dimension::Artist, options.top_limit),
        top_albums: top_entities(plays, Dimension::Album, options.top_limit),
        activity: activity(plays, options.offset),
        listening_streak: listening_streaks(plays, options.offset),
        monthly_top_tracks: monthly_top_tracks(plays, options.offset),
        timeline: timeline(plays, options.grouping, options.offset),
    }
}

pub fn summarize(plays: &[Play]) -> PlayStatistics {
    let overview = overview(plays);
    let top = |dimension| {
        top_entities(plays, dimension, 1)
            .into_iter()
            .next()
            .map_or_else(TopName::placeholder, |entity| TopName {
                name: entity.name,
                plays: entity.count,
            })
    };

    PlayStatistics {
        total_playtime: format::format_ms(overview.total_ms_played),
        unique_tracks: overview.unique_tracks,
        unique_artists: overview.unique_artists,
        average_playtime: format::format_ms(overview.average_ms_played as u64),
        top_artist: top(Dimension::Artist),
        top_track: top(Dimension::Track),
        top_album: top(Dimension::Album),
    }
}

enum DateBound {
    Instant(OffsetDateTime),
    Day(Date),
}

impl DateBound {
    fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(day) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
            return Some(Self::Day(day));
        }
        OffsetDateTime::parse(raw, &Rfc3339).ok().map(Self::Instant)
    }
}

/// Applies dashboard filters. Bare dates bound whole local days; plays whose timestamp cannot
/// be placed in time are never excluded by a date bound.
pub fn filter_plays<'a>(
    plays: &'a [Play],
    filters: &PlayFilters,
    offset: UtcOffset,
) -> Vec<&'a Play> {
    let matcher = QueryMatcher::parse(filters.query.trim());
    let start = DateBound::parse(filters.start_date.as_deref());
    let end = DateBound::parse(filters.end_date.as_deref());
    let artist = filters.artist.as_deref().filter(|value| !value.is_empty());
    let track = filters.track.as_deref().filter(|value| !value.is_empty());

    plays
        .iter()
        .filter(|play| {
            if let Some(local) = local_time(play, offset) {
                let before_start = match &start {
                    Some(DateBound::Instant(bound)) => local < *bound,
                    Some(DateBound::Day(day)) => local.date() < *day,
                    None => false,
                };
                let after_end = match &end {
                    Some(DateBound::Instant(bound)) => local > *bound,
                    Some(DateBound::Day(day)) => local.date() > *day,
                    None => false,
                };
                if before_start || after_end {
                    return false;
                }
            }
            if artist.is_some_and(|artist| play.artist_name.as_deref() != Some(artist)) {
                return false;
            }
            if track.is_some_and(|track| play.track_name.as_deref() != Some(track)) {
                return false;
            }
            matcher.matches(play)
        })
        .collect()
}

pub fn calculate(
    plays: &[Play],
    request: &CalculationRequest,
    options: &StatsOptions,
) -> CalculationResult {
    let mut filtered: Vec<Play> = filter_plays(plays, &request.filters, options.offset)
        .into_iter()
        .cloned()
        .collect();
    filtered.sort_by(|a, b| view::compare_plays(a, b, request.sort));

    let stats = compute(
        &filtered,
        &StatsOptions {
            grouping: request.grouping,
            ..*options
        },
    );
    CalculationResult {
        filtered_plays: filtered,
        stats,
    }
}
