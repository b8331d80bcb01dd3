//! Keyword vocabulary: the built-in intent keywords plus the learned log.
//!
//! The learned log is a JSON array of strings. It is additive only and is
//! rewritten in full (temp file → fsync → rename) on every addition so that
//! hand edits made between additions are preserved and deduplicated against.

use crate::error::{CraxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Built-in vocabulary, always present regardless of the learned log.
pub const BUILTIN_KEYWORDS: &[&str] = &[
    "music",
    "video",
    "volume",
    "pause",
    "play",
    "lights",
    "temperature",
    "fan",
    "lock",
    "alarm",
    "appliances",
    "app",
    "shutdown",
    "screenshot",
    "search",
    "file",
    "reminder",
    "calendar",
    "email",
    "message",
    "note",
    "weather",
    "news",
    "time",
    "date",
    "joke",
    "trivia",
    "quote",
    "game",
    "conversation",
    "goodbye",
    "status",
];

/// Why a string could not become a [`Keyword`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordError {
    /// Nothing left after trimming.
    #[error("keyword is empty")]
    Empty,
    /// More than one token.
    #[error("keyword '{0}' contains whitespace")]
    Whitespace(String),
}

/// A normalized intent identifier: lower-case, trimmed, single token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Keyword(String);

impl Keyword {
    /// Normalize `raw` into a keyword.
    ///
    /// Surrounding whitespace and ASCII punctuation (other than `_` and `-`)
    /// are stripped and the result is lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordError`] if the result is empty or contains whitespace.
    pub fn new(raw: &str) -> std::result::Result<Self, KeywordError> {
        let trimmed = raw
            .trim()
            .trim_matches(|c: char| c.is_ascii_punctuation() && c != '_' && c != '-')
            .trim();
        if trimmed.is_empty() {
            return Err(KeywordError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(KeywordError::Whitespace(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// The normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Keyword {
    type Error = KeywordError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Keyword> for String {
    fn from(value: Keyword) -> Self {
        value.0
    }
}

impl AsRef<str> for Keyword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The known vocabulary, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: BTreeSet<Keyword>,
}

impl KeywordSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in vocabulary only.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN_KEYWORDS
            .iter()
            .filter_map(|k| Keyword::new(k).ok())
            .collect()
    }

    /// Add a keyword. Returns `true` if it was not already present.
    pub fn insert(&mut self, keyword: Keyword) -> bool {
        self.keywords.insert(keyword)
    }

    /// Whether `keyword` is known.
    #[must_use]
    pub fn contains(&self, keyword: &Keyword) -> bool {
        self.keywords.contains(keyword)
    }

    /// Number of known keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Sorted iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }

    /// All keywords, sorted, joined with `sep`.
    #[must_use]
    pub fn joined(&self, sep: &str) -> String {
        self.keywords
            .iter()
            .map(Keyword::as_str)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl FromIterator<Keyword> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = Keyword>>(iter: I) -> Self {
        Self {
            keywords: iter.into_iter().collect(),
        }
    }
}

impl Extend<Keyword> for KeywordSet {
    fn extend<I: IntoIterator<Item = Keyword>>(&mut self, iter: I) {
        self.keywords.extend(iter);
    }
}

/// Result of [`KeywordStore::persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The keyword was appended and the log rewritten.
    Added,
    /// The log already held the keyword; nothing was written.
    AlreadyPresent,
}

/// Durable store for learned keywords.
#[derive(Debug, Clone)]
pub struct KeywordStore {
    path: PathBuf,
}

impl KeywordStore {
    /// Store backed by the log at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `crax_dirs::keywords_file()`.
    #[must_use]
    pub fn at_default_path() -> Self {
        Self::new(crate::crax_dirs::keywords_file())
    }

    /// Location of the durable log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Built-in keywords unioned with everything in the durable log.
    ///
    /// A missing log contributes nothing. An unreadable or malformed log
    /// is logged and treated as empty.
    #[must_use]
    pub fn load(&self) -> KeywordSet {
        let mut set = KeywordSet::builtin();
        set.extend(self.learned());
        set
    }

    /// Learned keywords in log order, normalized and deduplicated.
    ///
    /// Invalid entries are skipped with a warning.
    #[must_use]
    pub fn learned(&self) -> Vec<Keyword> {
        let entries = match self.read_log() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("couldn't read {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match Keyword::new(&entry) {
                Ok(k) => {
                    if seen.insert(k.clone()) {
                        out.push(k);
                    }
                }
                Err(e) => warn!("skipping keyword log entry {entry:?}: {e}"),
            }
        }
        out
    }

    /// Append `keyword` to the durable log unless it is already there.
    ///
    /// The log is re-read before every write. If it cannot be read it is
    /// treated as empty, so a corrupt log is replaced by one holding only
    /// this keyword.
    ///
    /// # Errors
    ///
    /// Returns [`CraxError::Keywords`] if the rewritten log cannot be written.
    pub fn persist(&self, keyword: &Keyword) -> Result<PersistOutcome> {
        let mut entries = self.read_log().unwrap_or_else(|e| {
            warn!(
                "couldn't read {} before update, starting fresh: {e}",
                self.path.display()
            );
            Vec::new()
        });

        if entries
            .iter()
            .any(|e| Keyword::new(e).is_ok_and(|k| &k == keyword))
        {
            return Ok(PersistOutcome::AlreadyPresent);
        }

        entries.push(keyword.as_str().to_owned());
        self.write_log(&entries)?;
        info!("saved new keyword: {keyword}");
        Ok(PersistOutcome::Added)
    }

    /// Raw log entries. Missing and blank files read as empty.
    fn read_log(&self) -> Result<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| CraxError::Keywords(format!("malformed keyword log: {e}")))
    }

    /// Rewrite the log atomically (temp file → fsync → rename).
    fn write_log(&self, entries: &[String]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| CraxError::Keywords(format!("failed to serialize keywords: {e}")))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                CraxError::Keywords(format!(
                    "failed to create directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
            CraxError::Keywords(format!(
                "failed to create temp file '{}': {e}",
                tmp_path.display()
            ))
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| CraxError::Keywords(format!("failed to write temp file: {e}")))?;
        file.sync_all()
            .map_err(|e| CraxError::Keywords(format!("failed to sync temp file: {e}")))?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            CraxError::Keywords(format!(
                "failed to rename '{}' to '{}': {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })
    }
}
