//! Driver-side integration seam.
//!
//! The engine never talks to a browser directly. Runners implement
//! [`DriverAdapter`] for their driver of choice and wrap it in a
//! [`HealingDriver`], which invokes the pipeline whenever a lookup
//! comes back empty.

use crate::engine::HealingEngine;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use selheal_core_types::{
    ActionType, DecisionSource, FailureContext, HealOutcome, LocatorInfo, SessionId, UiSnapshot,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one raw element lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindResult {
    Found,
    /// The lookup missed; the driver's exception class and message
    /// travel with it so the pipeline hears the real failure.
    NotFound { kind: String, message: String },
}

impl FindResult {
    pub fn not_found(kind: impl Into<String>, message: impl Into<String>) -> Self {
        FindResult::NotFound {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Minimal driver surface the engine needs.
#[async_trait]
pub trait DriverAdapter: Send + Sync {
    /// Probe for an element without throwing on absence.
    async fn find(&self, locator: &LocatorInfo) -> Result<FindResult>;

    /// Capture the current page state for candidate scoring.
    async fn capture_snapshot(&self) -> Result<UiSnapshot>;
}

/// Outcome of a healed lookup.
#[derive(Debug, Clone)]
pub enum Located {
    /// The element was found; `outcome` is set when healing ran.
    Found {
        locator: LocatorInfo,
        outcome: Option<HealOutcome>,
    },
    /// The element stayed missing; `outcome` explains why healing
    /// did not resolve it (including SUGGEST-mode decisions, which
    /// are reported but never applied).
    Missing { outcome: HealOutcome },
}

impl Located {
    pub fn is_found(&self) -> bool {
        matches!(self, Located::Found { .. })
    }

    pub fn locator(&self) -> Option<&LocatorInfo> {
        match self {
            Located::Found { locator, .. } => Some(locator),
            Located::Missing { .. } => None,
        }
    }
}

/// Wraps a driver and heals failed lookups through the shared engine.
pub struct HealingDriver<D: DriverAdapter> {
    driver: Arc<D>,
    engine: Arc<HealingEngine>,
}

impl<D: DriverAdapter> HealingDriver<D> {
    pub fn new(driver: Arc<D>, engine: Arc<HealingEngine>) -> Self {
        Self { driver, engine }
    }

    pub fn engine(&self) -> &Arc<HealingEngine> {
        &self.engine
    }

    /// Find an element, healing on failure.
    ///
    /// A cache-sourced heal that fails at use time evicts the entry
    /// and re-runs the pipeline once; any other failed heal is final
    /// for this call.
    pub async fn find_element(
        &self,
        original: &LocatorInfo,
        action: ActionType,
        step_text: &str,
    ) -> Result<Located> {
        let (kind, message) = match self.driver.find(original).await? {
            FindResult::Found => {
                return Ok(Located::Found {
                    locator: original.clone(),
                    outcome: None,
                });
            }
            FindResult::NotFound { kind, message } => (kind, message),
        };

        let snapshot = self.capture_or_empty().await;
        let ctx =
            FailureContext::new(original.clone(), action, step_text).with_exception(kind, message);

        let mut outcome = self.engine.heal(&ctx, &snapshot).await;
        let mut retried_stale = false;

        loop {
            let HealOutcome::Healed { locator, source, .. } = &outcome else {
                return Ok(Located::Missing { outcome });
            };

            if !self.engine.should_apply(action) {
                info!(original = %original, suggested = %locator, "heal suggested but not applied in current mode");
                return Ok(Located::Missing { outcome });
            }

            if matches!(self.driver.find(locator).await?, FindResult::Found) {
                debug!(original = %original, healed = %locator, "healed lookup succeeded");
                return Ok(Located::Found {
                    locator: locator.clone(),
                    outcome: Some(outcome.clone()),
                });
            }

            if *source == DecisionSource::Cache && !retried_stale {
                self.engine.report_stale_hit(&ctx, &snapshot.url);
                retried_stale = true;
                outcome = self.engine.heal(&ctx, &snapshot).await;
                continue;
            }

            return Ok(Located::Missing {
                outcome: HealOutcome::Failed {
                    reason: format!("healed selector {locator} did not resolve"),
                },
            });
        }
    }

    /// Snapshot capture degrades to an empty page rather than failing
    /// the lookup.
    async fn capture_or_empty(&self) -> UiSnapshot {
        match self.driver.capture_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "snapshot capture failed, healing with empty page state");
                UiSnapshot::new("", "")
            }
        }
    }
}

/// Explicit session bookkeeping: runners register each driver session
/// under their own id and unregister it when the session ends.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<dyn DriverAdapter>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: SessionId, driver: Arc<dyn DriverAdapter>) {
        debug!(session = %session_id, "session registered");
        self.sessions.insert(session_id, driver);
    }

    pub fn unregister(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session = %session_id, "session unregistered");
        }
        removed
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Arc<dyn DriverAdapter>> {
        self.sessions.get(session_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
