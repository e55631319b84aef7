//! Bounded in-memory log of healing episodes for diagnostics.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use selheal_core_types::{EpisodeId, HealOutcome, LocatorInfo};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const MAX_EVENTS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealEvent {
    pub episode: EpisodeId,
    pub at: DateTime<Utc>,
    pub scenario: Option<String>,
    pub page_url: String,
    pub original: LocatorInfo,
    pub outcome: HealOutcome,
    pub latency_ms: u64,
}

/// Keeps the last [`MAX_EVENTS`] healing episodes, newest last.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<VecDeque<HealEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: HealEvent) {
        let mut events = self.events.lock();
        if events.len() >= MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn recent(&self, limit: usize) -> Vec<HealEvent> {
        let events = self.events.lock();
        events.iter().rev().take(limit).rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
