use crate::model::{Play, SearchTerm, SortDirection, SortField, SortSpec};
use crate::search::QueryMatcher;
use std::cmp::Ordering;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub fn apply(records: &[Play], terms: &[SearchTerm], sort: SortSpec) -> Vec<Play> {
    let matcher = QueryMatcher::new(terms);
    let mut indices = filter_indices(records, &matcher);
    sort_indices(records, &mut indices, sort);
    indices.into_iter().map(|idx| records[idx].clone()).collect()
}

pub fn filter_indices(records: &[Play], matcher: &QueryMatcher) -> Vec<usize> {
    if matcher.is_empty() {
        return (0..records.len()).collect();
    }
    records
        .iter()
        .enumerate()
        .filter(|(_, play)| matcher.matches(play))
        .map(|(idx, _)| idx)
        .collect()
}

/// Stable: records that compare equal keep their order in `records`.
pub fn sort_indices(records: &[Play], indices: &mut Vec<usize>, sort: SortSpec) {
    if indices.is_empty() {
        return;
    }
    indices.sort_unstable();

    match sort.field {
        SortField::Timestamp => indices.sort_by(|a, b| {
            directed(
                records[*a].timestamp.cmp(&records[*b].timestamp),
                sort.direction,
            )
        }),
        SortField::Duration => indices.sort_by(|a, b| {
            directed(
                records[*a].ms_played.cmp(&records[*b].ms_played),
                sort.direction,
            )
        }),
        SortField::TrackName | SortField::ArtistName | SortField::AlbumName => {
            let mut keyed: Vec<(usize, Vec<char>)> = indices
                .iter()
                .map(|idx| (*idx, collation_key(text_field(&records[*idx], sort.field))))
                .collect();
            keyed.sort_by(|a, b| directed(natural_cmp_folded(&a.1, &b.1), sort.direction));
            *indices = keyed.into_iter().map(|(idx, _)| idx).collect();
        }
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn text_field(play: &Play, field: SortField) -> &str {
    match field {
        SortField::ArtistName => play.artist(),
        SortField::AlbumName => play.album(),
        _ => play.track(),
    }
}

pub fn compare_plays(a: &Play, b: &Play, sort: SortSpec) -> Ordering {
    let ordering = match sort.field {
        SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
        SortField::Duration => a.ms_played.cmp(&b.ms_played),
        field => natural_cmp(text_field(a, field), text_field(b, field)),
    };
    directed(ordering, sort.direction)
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_cmp_folded(&collation_key(a), &collation_key(b))
}

fn collation_key(text: &str) -> Vec<char> {
    text.nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

fn natural_cmp_folded(a: &[char], b: &[char]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let a_end = digit_run_end(a, i);
            let b_end = digit_run_end(b, j);
            let ordering = compare_digit_runs(&a[i..a_end], &b[j..b_end]);
            if ordering != Ordering::Equal {
                return ordering;
            }
            i = a_end;
            j = b_end;
            continue;
        }

        let ordering = a[i].cmp(&b[j]);
        if ordering != Ordering::Equal {
            return ordering;
        }
        i += 1;
        j += 1;
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|ch| !ch.is_ascii_digit())
        .map_or(chars.len(), |offset| start + offset)
}

fn compare_digit_runs(a: &[char], b: &[char]) -> Ordering {
    let a = trim_leading_zeros(a);
    let b = trim_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn trim_leading_zeros(digits: &[char]) -> &[char] {
    let first = digits
        .iter()
        .position(|ch| *ch != '0')
        .unwrap_or(digits.len());
    &digits[first..]
}

#[derive(Debug, Clone)]
pub struct PlayView {
    records: Arc<[Play]>,
    query: String,
    matcher: QueryMatcher,
    sort: SortSpec,
    visible: Vec<usize>,
}

impl PlayView {
    pub fn new(records: Arc<[Play]>) -> Self {
        let mut view = Self {
            records,
            query: String::new(),
            matcher: QueryMatcher::default(),
            sort: SortSpec::default(),
            visible: Vec::new(),
        };
        view.refilter();
        view
    }

    pub fn set_records(&mut self, records: Arc<[Play]>) {
        self.records = records;
        self.refilter();
    }

    /// Returns false when the trimmed query is unchanged and nothing was recomputed.
    pub fn set_query(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query == self.query {
            return false;
        }
        self.query = query.to_string();
        self.matcher = QueryMatcher::parse(query);
        self.refilter();
        true
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        if sort == self.sort {
            return;
        }
        self.sort = sort;
        sort_indices(&self.records, &mut self.visible, self.sort);
    }

    pub fn toggle_sort(&mut self, field: SortField) {
        self.set_sort(self.sort.toggle(field));
    }

    pub fn reset_sort(&mut self) {
        self.set_sort(SortSpec::default());
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn records(&self) -> &Arc<[Play]> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Play> {
        self.visible
            .get(position)
            .map(|idx| &self.records[*idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Play> + '_ {
        self.visible.iter().map(|idx| &self.records[*idx])
    }

    pub fn to_vec(&self) -> Vec<Play> {
        self.iter().cloned().collect()
    }

    fn refilter(&mut self) {
        self.visible = filter_indices(&self.records, &self.matcher);
        sort_indices(&self.records, &mut self.visible, self.sort);
    }
}
