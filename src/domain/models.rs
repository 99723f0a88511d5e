use std::fmt;

/// Content-derived identity of a video file, independent of its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn from_accumulator(accumulator: u64) -> Self {
        // Big-endian rendering of the little-endian accumulator, i.e. the
        // byte-reversed sum.
        Self(format!("{accumulator:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which stream of a container a cached artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Index(u32),
    /// Subtitles produced by speech-to-text rather than read from the file.
    Generated,
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKey::Index(index) => write!(f, "{index}"),
            StreamKey::Generated => f.write_str("generated"),
        }
    }
}

/// Season plus one or more contiguous episode numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeId {
    pub season_number: u32,
    pub episode_numbers: Vec<u32>,
}

impl EpisodeId {
    pub fn single(season_number: u32, episode_number: u32) -> Self {
        Self {
            season_number,
            episode_numbers: vec![episode_number],
        }
    }

    pub fn range(season_number: u32, first: u32, last: u32) -> Self {
        let (first, last) = if first <= last {
            (first, last)
        } else {
            (last, first)
        };
        Self {
            season_number,
            episode_numbers: (first..=last).collect(),
        }
    }

    /// `s01e02`, or `s01e02-e03` for multi-episode files.
    pub fn name_segment(&self) -> String {
        match (self.episode_numbers.first(), self.episode_numbers.last()) {
            (Some(first), Some(last)) if first != last => {
                format!("s{:02}e{first:02}-e{last:02}", self.season_number)
            }
            (Some(first), _) => format!("s{:02}e{first:02}", self.season_number),
            (None, _) => format!("s{:02}", self.season_number),
        }
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name_segment())
    }
}

/// The show and season a folder holds, as given on the command line or
/// detected from folder names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowIdentity {
    pub imdb: Option<String>,
    pub title: String,
    pub season_number: u32,
}

/// Cleaned lowercase subtitle lines; order is kept for debugging only.
pub type NormalizedLines = Vec<String>;

/// Known-correct subtitle text for one episode (or multi-episode file).
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub episode: EpisodeId,
    /// Normalized reference lines joined with a single space.
    pub contents: String,
    pub line_count: usize,
}

impl ReferenceEntry {
    pub fn from_lines(episode: EpisodeId, lines: &[String]) -> Self {
        Self {
            episode,
            contents: lines.join(" "),
            line_count: lines.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub episode: EpisodeId,
    /// Candidate lines found in the reference text.
    pub matched: usize,
    /// Line count of the reference entry.
    pub line_count: usize,
    /// `matched` over `line_count`, in `[0, 1]`.
    pub confidence: f64,
    pub weighted_confidence: f64,
}

impl MatchResult {
    fn clamped_matched(&self) -> usize {
        self.matched.min(self.line_count)
    }

    pub fn confidence_percent(&self) -> u32 {
        if self.line_count == 0 {
            return 0;
        }
        (self.clamped_matched() * 100 / self.line_count) as u32
    }

    /// Integer comparison so a match sitting exactly on the threshold passes.
    pub fn meets_threshold(&self, threshold_percent: u8) -> bool {
        self.line_count > 0
            && self.clamped_matched() * 100 >= usize::from(threshold_percent) * self.line_count
    }
}
