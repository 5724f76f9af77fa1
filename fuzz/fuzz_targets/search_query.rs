#![no_main]

use libfuzzer_sys::fuzz_target;
use streamscope::model::{Play, SearchScope};
use streamscope::search::{QueryMatcher, parse_query};

fuzz_target!(|data: &[u8]| {
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };

    let terms = parse_query(query);
    for term in &terms {
        if term.scope == SearchScope::General {
            assert!(!term.value.is_empty());
            assert!(!term.value.contains(char::is_whitespace));
        }
    }

    let play = Play {
        id: String::from("fuzz-0"),
        timestamp: String::from("2024-01-01T00:00:00Z"),
        ms_played: 0,
        track_name: Some(query.to_string()),
        artist_name: None,
        album_name: None,
        track_uri: None,
        source: String::from("fuzz.json"),
    };
    let _ = QueryMatcher::new(&terms).matches(&play);
});
