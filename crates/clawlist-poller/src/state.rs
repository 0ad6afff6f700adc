//! Persisted poller state: sync cursor, seen event ids, last poll time.
//!
//! Stored as `KEY=value` lines:
//!
//! ```text
//! NEXT_BATCH=s72595_4483_1934
//! SEEN_MESSAGES=["$abc:localhost","$def:localhost"]
//! LAST_POLL_TIME=1700000000000
//! ```
//!
//! Reading is permissive: lines that do not start with an upper-case key
//! followed by `=` are ignored, an unparsable seen list reads as empty and
//! an unparsable timestamp reads as zero. Writing replaces the whole file.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::StateError;

const NEXT_BATCH_KEY: &str = "NEXT_BATCH";
const SEEN_MESSAGES_KEY: &str = "SEEN_MESSAGES";
const LAST_POLL_TIME_KEY: &str = "LAST_POLL_TIME";

/// Cursor and dedup set owned by the poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerState {
    /// Continuation token from the last successful sync.
    pub next_batch: Option<String>,
    /// Every event id the poller has processed. Only grows.
    pub seen: BTreeSet<String>,
    /// Epoch milliseconds of the last successful cycle, 0 if never.
    pub last_poll_ms: i64,
}

impl PollerState {
    /// Parses state file contents, falling back to defaults per field.
    pub fn parse(content: &str) -> Self {
        let mut state = Self::default();

        for (key, value) in content.lines().filter_map(parse_line) {
            match key {
                NEXT_BATCH_KEY => {
                    let value = value.trim();
                    state.next_batch = (!value.is_empty()).then(|| value.to_string());
                }
                SEEN_MESSAGES_KEY => match serde_json::from_str::<Vec<String>>(value) {
                    Ok(ids) => state.seen = ids.into_iter().collect(),
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable seen-message list, starting empty");
                    }
                },
                LAST_POLL_TIME_KEY => {
                    state.last_poll_ms = value.trim().parse().unwrap_or(0);
                }
                _ => {}
            }
        }
        state
    }

    /// Renders the state in file form.
    pub fn render(&self) -> Result<String, StateError> {
        let seen: Vec<&String> = self.seen.iter().collect();
        Ok(format!(
            "{NEXT_BATCH_KEY}={}\n{SEEN_MESSAGES_KEY}={}\n{LAST_POLL_TIME_KEY}={}\n",
            self.next_batch.as_deref().unwrap_or(""),
            serde_json::to_string(&seen)?,
            self.last_poll_ms
        ))
    }

    /// Loads state from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StateError::Io(e)),
        }
    }

    /// Writes state to `path` through a sibling temp file and a rename, so
    /// a crash mid-write leaves the previous state intact. Parent
    /// directories are created as needed.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, self.render()?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Records `event_id` as seen. Returns `false` if it already was.
    pub fn mark_seen(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }
        self.seen.insert(event_id.to_string())
    }

    pub fn is_seen(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }
}

/// Splits `KEY=value`, accepting only keys of `[A-Z0-9_]+`.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let valid_key = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
    valid_key.then_some((key, value))
}
