#![no_main]

use libfuzzer_sys::fuzz_target;
use streamscope::{ExplorerConfig, SourceFile, ingest};

fuzz_target!(|data: &[u8]| {
    let config = ExplorerConfig::default();
    let files = vec![
        SourceFile::new("Streaming_History_Audio_fuzz.json", data.to_vec()),
        SourceFile::new("my_spotify_data.zip", data.to_vec()),
    ];

    if let Ok(result) = ingest(&files, &config) {
        assert!(
            result
                .plays
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp)
        );
        assert!(result.plays.iter().all(|play| !play.timestamp.trim().is_empty()));
    }
});
