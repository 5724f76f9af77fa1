use crate::model::{Play, SearchScope, SearchTerm};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static FIELD_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(track|artist|album):(?:"([^"]*)"|(\S+))"#).expect("field term pattern")
});
static QUOTED_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("quoted term pattern"));

/// Passes run in order and each removes what it matched: `field:value` / `field:"phrase"` first,
/// then bare `"phrase"`, then whitespace-separated words.
pub fn parse_query(query: &str) -> Vec<SearchTerm> {
    let mut terms = Vec::new();

    let remaining = FIELD_TERM.replace_all(query, |caps: &Captures| {
        let scope = match &caps[1] {
            "track" => SearchScope::Track,
            "artist" => SearchScope::Artist,
            _ => SearchScope::Album,
        };
        let (value, exact) = match (caps.get(2), caps.get(3)) {
            (Some(quoted), _) => (quoted.as_str(), true),
            (None, Some(bare)) => (bare.as_str(), false),
            (None, None) => ("", false),
        };
        terms.push(SearchTerm {
            scope,
            value: value.to_lowercase(),
            exact_word_boundary: exact,
        });
        " "
    });

    let remaining = QUOTED_TERM.replace_all(&remaining, |caps: &Captures| {
        terms.push(SearchTerm {
            scope: SearchScope::Exact,
            value: caps[1].to_lowercase(),
            exact_word_boundary: true,
        });
        " "
    });

    terms.extend(remaining.split_whitespace().map(|word| SearchTerm {
        scope: SearchScope::General,
        value: word.to_lowercase(),
        exact_word_boundary: false,
    }));
    terms
}

#[derive(Debug, Clone)]
struct CompiledTerm {
    term: SearchTerm,
    word_pattern: Option<Regex>,
}

impl CompiledTerm {
    fn new(term: SearchTerm) -> Self {
        let word_pattern = if term.exact_word_boundary {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&term.value));
            match Regex::new(&pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    log::warn!("falling back to substring match for {:?}: {err}", term.value);
                    None
                }
            }
        } else {
            None
        };
        Self { term, word_pattern }
    }

    fn matches_text(&self, text: &str) -> bool {
        match &self.word_pattern {
            Some(regex) => regex.is_match(text),
            None => text.contains(self.term.value.as_str()),
        }
    }

    fn matches(&self, fields: &LoweredFields) -> bool {
        match self.term.scope {
            SearchScope::Track => self.matches_text(&fields.track),
            SearchScope::Artist => self.matches_text(&fields.artist),
            SearchScope::Album => self.matches_text(&fields.album),
            SearchScope::Exact => self.matches_text(&fields.joined()),
            SearchScope::General => {
                let value = self.term.value.as_str();
                fields.track.contains(value)
                    || fields.artist.contains(value)
                    || fields.album.contains(value)
            }
        }
    }
}

struct LoweredFields {
    track: String,
    artist: String,
    album: String,
}

impl LoweredFields {
    fn of(play: &Play) -> Self {
        Self {
            track: play.track().to_lowercase(),
            artist: play.artist().to_lowercase(),
            album: play.album().to_lowercase(),
        }
    }

    fn joined(&self) -> String {
        format!("{} {} {}", self.track, self.artist, self.album)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryMatcher {
    terms: Vec<CompiledTerm>,
}

impl QueryMatcher {
    pub fn new(terms: &[SearchTerm]) -> Self {
        Self {
            terms: terms.iter().cloned().map(CompiledTerm::new).collect(),
        }
    }

    pub fn parse(query: &str) -> Self {
        Self::new(&parse_query(query))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, play: &Play) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let fields = LoweredFields::of(play);
        self.terms.iter().all(|term| term.matches(&fields))
    }
}
