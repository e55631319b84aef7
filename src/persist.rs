//! State persistence boundary.
//!
//! Everything the engine learns during a run (cache entries, the
//! blacklist, learned patterns) round-trips through [`StateBundle`],
//! a plain serde_json payload written to a directory. Storage beyond
//! that is the caller's business.

use crate::engine::HealingEngine;
use crate::errors::PersistError;
use chrono::{DateTime, Utc};
use selheal_cache::CacheBundle;
use selheal_guard::BlacklistEntry;
use selheal_learner::LearnerBundle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const STATE_FILE: &str = "selheal_state.json";

/// Serializable snapshot of all engine state worth keeping between
/// runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateBundle {
    pub exported_at: DateTime<Utc>,
    pub cache: CacheBundle,
    pub blacklist: Vec<BlacklistEntry>,
    pub learner: LearnerBundle,
}

impl StateBundle {
    pub fn capture(engine: &HealingEngine) -> Self {
        Self {
            exported_at: Utc::now(),
            cache: engine.cache().export(),
            blacklist: engine.guard().export_blacklist(),
            learner: engine.learner().export(),
        }
    }

    pub fn restore(self, engine: &HealingEngine) {
        let cached = engine.cache().import(self.cache);
        engine.guard().import_blacklist(self.blacklist);
        engine.learner().import(self.learner);
        info!(cached, "restored persisted state");
    }

    /// Write the bundle into `dir` (created if missing).
    pub fn save(&self, dir: &Path) -> Result<(), PersistError> {
        std::fs::create_dir_all(dir).map_err(|source| PersistError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(STATE_FILE);
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| PersistError::Io { path, source })?;
        Ok(())
    }

    /// Read a previously saved bundle; `Ok(None)` when none exists.
    pub fn load(dir: &Path) -> Result<Option<Self>, PersistError> {
        let path = dir.join(STATE_FILE);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PersistError::Io { path, source }),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealConfig;
    use selheal_arbiter::ExternalArbitrator;
    use selheal_core_types::{FeedbackKind, LocatorInfo};

    fn engine() -> HealingEngine {
        HealingEngine::with_arbitrator(HealConfig::default(), ExternalArbitrator::new())
    }

    #[test]
    fn missing_state_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StateBundle::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn state_round_trips_through_directory() {
        let source = engine();
        source.submit_feedback(crate::engine::Feedback {
            kind: FeedbackKind::Correction,
            original: LocatorInfo::id("old-btn"),
            healed: Some(LocatorInfo::css("button.wrong")),
            correct: Some(LocatorInfo::css("button.right")),
            reason: Some("picked the wrong button".to_string()),
        });

        let dir = tempfile::tempdir().unwrap();
        StateBundle::capture(&source).save(dir.path()).unwrap();

        let target = engine();
        StateBundle::load(dir.path())
            .unwrap()
            .expect("saved state exists")
            .restore(&target);

        assert!(target.guard().is_blacklisted(
            &LocatorInfo::id("old-btn"),
            &LocatorInfo::css("button.wrong")
        ));
        assert_eq!(target.learner().pattern_count(), 1);
    }
}
