//! Audio object key filtering.

/// Extensions accepted by default.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg"];

/// Keeps object keys that name audio files.
///
/// Matching is a case-sensitive suffix check on `.<ext>`; order and duplicates are preserved.
#[derive(Debug, Clone)]
pub struct AudioKeyFilter {
    suffixes: Vec<String>,
}

impl Default for AudioKeyFilter {
    fn default() -> Self {
        Self::with_extensions(AUDIO_EXTENSIONS.iter().copied())
    }
}

impl AudioKeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = extensions
            .into_iter()
            .map(|e| format!(".{}", e.as_ref().trim_start_matches('.')))
            .collect();
        Self { suffixes }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.suffixes.iter().any(|s| key.ends_with(s.as_str()))
    }

    pub fn filter<I>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        keys.into_iter().filter(|k| self.matches(k)).collect()
    }
}
