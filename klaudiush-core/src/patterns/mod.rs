//! Failure-pattern tracker.
//!
//! Observes ordered pairs of error codes within one session window and keeps
//! per-project and global counts. External tooling reads these to warn about
//! likely follow-up failures; nothing here feeds back into the decision
//! pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use klaudiush_config::{PatternsConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::{FileLock, atomic_write};

/// Pairs shipped with the binary as bootstrap data.
const SEED_PAIRS: &[(&str, &str)] = &[
    ("GIT010", "GIT012"),
    ("GIT022", "GIT010"),
    ("SEC001", "FILE020"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePattern {
    pub source_code: String,
    pub target_code: String,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Bootstrapped from built-in data rather than observed.
    #[serde(default)]
    pub seed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    last_code: Option<String>,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PatternStore {
    #[serde(default)]
    patterns: Vec<FailurePattern>,
    #[serde(default)]
    sessions: BTreeMap<String, SessionRecord>,
}

impl PatternStore {
    fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            patterns: SEED_PAIRS
                .iter()
                .map(|(source, target)| FailurePattern {
                    source_code: (*source).to_string(),
                    target_code: (*target).to_string(),
                    count: 1,
                    first_seen: now,
                    last_seen: now,
                    seed: true,
                })
                .collect(),
            sessions: BTreeMap::new(),
        }
    }

    fn bump(&mut self, source: &str, target: &str, now: DateTime<Utc>) {
        match self
            .patterns
            .iter_mut()
            .find(|pattern| pattern.source_code == source && pattern.target_code == target)
        {
            Some(pattern) => {
                pattern.count += 1;
                pattern.last_seen = now;
            }
            None => self.patterns.push(FailurePattern {
                source_code: source.to_string(),
                target_code: target.to_string(),
                count: 1,
                first_seen: now,
                last_seen: now,
                seed: false,
            }),
        }
    }
}

pub struct PatternTracker {
    project_path: PathBuf,
    global_path: PathBuf,
    session_window: Duration,
    max_age: Duration,
    session_max_age: Duration,
}

impl PatternTracker {
    pub fn new(
        project_path: PathBuf,
        global_path: PathBuf,
        patterns: &PatternsConfig,
        session: &SessionConfig,
    ) -> Self {
        Self {
            project_path,
            global_path,
            session_window: Duration::minutes(i64::from(session.window_minutes)),
            max_age: Duration::days(i64::from(patterns.max_age_days)),
            session_max_age: Duration::hours(i64::from(patterns.session_max_age_hours)),
        }
    }

    /// Conventional store locations: `<workspace>/.klaudiush/patterns.json`
    /// plus the global file in the state directory.
    pub fn at_default_paths(
        workspace: &Path,
        state_dir: &Path,
        patterns: &PatternsConfig,
        session: &SessionConfig,
    ) -> Self {
        Self::new(
            workspace.join(".klaudiush").join("patterns.json"),
            state_dir.join("patterns.json"),
            patterns,
            session,
        )
    }

    /// Record the blocked codes of one invocation, in order, chaining from
    /// the session's previous failure when it is inside the window.
    pub fn record_failures(
        &self,
        session_id: &str,
        codes: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if codes.is_empty() || session_id.is_empty() {
            return Ok(());
        }
        for path in [&self.project_path, &self.global_path] {
            if let Err(error) = self.record_in(path, session_id, codes, now) {
                warn!(path = %path.display(), %error, "failed to update pattern store");
            }
        }
        Ok(())
    }

    fn record_in(
        &self,
        path: &Path,
        session_id: &str,
        codes: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let _lock = FileLock::acquire(path)?;
        let mut store = load_store(path, now);

        let mut previous = store
            .sessions
            .get(session_id)
            .filter(|record| now - record.last_seen <= self.session_window)
            .and_then(|record| record.last_code.clone());

        for code in codes {
            if let Some(source) = previous.as_deref() {
                if source != code {
                    store.bump(source, code, now);
                }
            }
            previous = Some(code.clone());
        }

        store.sessions.insert(
            session_id.to_string(),
            SessionRecord {
                last_code: previous,
                last_seen: now,
            },
        );

        save_store(path, &store)
    }

    /// Drop stale observations and idle sessions from both stores. Seed
    /// entries are kept.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<()> {
        for path in [&self.project_path, &self.global_path] {
            let _lock = FileLock::acquire(path)?;
            let mut store = load_store(path, now);
            store
                .patterns
                .retain(|pattern| pattern.seed || now - pattern.last_seen <= self.max_age);
            store
                .sessions
                .retain(|_, record| now - record.last_seen <= self.session_max_age);
            save_store(path, &store)?;
        }
        Ok(())
    }

    pub fn project_patterns(&self) -> Result<Vec<FailurePattern>> {
        Ok(load_store(&self.project_path, Utc::now()).patterns)
    }

    pub fn global_patterns(&self) -> Result<Vec<FailurePattern>> {
        Ok(load_store(&self.global_path, Utc::now()).patterns)
    }
}

fn load_store(path: &Path, now: DateTime<Utc>) -> PatternStore {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(error) => {
                warn!(path = %path.display(), %error, "pattern store is corrupt; reseeding");
                PatternStore::seeded(now)
            }
        },
        Err(_) => PatternStore::seeded(now),
    }
}

fn save_store(path: &Path, store: &PatternStore) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(store)?;
    atomic_write(path, &serialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tracker(dir: &Path) -> PatternTracker {
        PatternTracker::new(
            dir.join("project-patterns.json"),
            dir.join("global-patterns.json"),
            &PatternsConfig::default(),
            &SessionConfig::default(),
        )
    }

    #[test]
    fn fresh_store_carries_seed_entries() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let patterns = tracker.project_patterns().unwrap();
        assert!(!patterns.is_empty());
        assert!(patterns.iter().all(|pattern| pattern.seed));
    }

    #[test]
    fn consecutive_failures_in_a_session_form_a_pair() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let now = Utc::now();

        tracker
            .record_failures("session-1", &["GIT022".to_string()], now)
            .unwrap();
        tracker
            .record_failures(
                "session-1",
                &["GIT010".to_string()],
                now + Duration::minutes(5),
            )
            .unwrap();

        let patterns = tracker.project_patterns().unwrap();
        let pair = patterns
            .iter()
            .find(|pattern| pattern.source_code == "GIT022" && pattern.target_code == "GIT010")
            .expect("pair recorded");
        // Seeded at count 1, observed once more.
        assert_eq!(pair.count, 2);
    }

    #[test]
    fn failures_outside_the_window_do_not_chain() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let now = Utc::now();

        tracker
            .record_failures("session-1", &["SHELL001".to_string()], now)
            .unwrap();
        tracker
            .record_failures(
                "session-1",
                &["SEC001".to_string()],
                now + Duration::hours(2),
            )
            .unwrap();

        let patterns = tracker.project_patterns().unwrap();
        assert!(
            !patterns
                .iter()
                .any(|pattern| pattern.source_code == "SHELL001")
        );
    }

    #[test]
    fn sessions_are_isolated() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let now = Utc::now();

        tracker
            .record_failures("a", &["SHELL001".to_string()], now)
            .unwrap();
        tracker
            .record_failures("b", &["SEC001".to_string()], now)
            .unwrap();

        let patterns = tracker.project_patterns().unwrap();
        assert!(
            !patterns
                .iter()
                .any(|pattern| pattern.source_code == "SHELL001")
        );
    }

    #[test]
    fn cleanup_drops_stale_observations_but_keeps_seeds() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let old = Utc::now() - Duration::days(200);

        tracker
            .record_failures("s", &["SHELL001".to_string(), "SEC001".to_string()], old)
            .unwrap();
        tracker.cleanup(Utc::now()).unwrap();

        let patterns = tracker.project_patterns().unwrap();
        assert!(patterns.iter().all(|pattern| pattern.seed));
    }
}
