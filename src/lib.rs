//! selheal — self-healing locators for automated browser tests.
//!
//! When a test step fails because a selector no longer matches, the
//! engine scores replacement candidates from the live page, asks an
//! external reasoning provider to arbitrate, applies guardrails, and
//! hands the runner a decision it can apply, suggest, or refuse.
//!
//! ```no_run
//! use selheal::{HealConfig, HealingEngine};
//! use selheal::{ActionType, FailureContext, LocatorInfo, UiSnapshot};
//!
//! # async fn demo(snapshot: UiSnapshot) -> anyhow::Result<()> {
//! let engine = HealingEngine::new(HealConfig::load(None)?);
//! let ctx = FailureContext::new(
//!     LocatorInfo::id("login-btn"),
//!     ActionType::Click,
//!     "click login button",
//! );
//! let outcome = engine.heal(&ctx, &snapshot).await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod persist;

pub use bridge::{DriverAdapter, FindResult, HealingDriver, Located, SessionRegistry};
pub use config::{BreakerSettings, CacheSettings, HealConfig, HealMode, ProviderSettings};
pub use engine::{Feedback, HealingEngine};
pub use errors::{ConfigError, PersistError};
pub use events::{EventLog, HealEvent};
pub use persist::StateBundle;

pub use selheal_core_types::{
    ActionType, DecisionSource, ElementCandidate, ElementSnapshot, EpisodeId, FailureContext,
    FeedbackKind, HealDecision, HealOutcome, LocatorInfo, LocatorStrategy, SessionId, UiSnapshot,
};

pub use selheal_arbiter::{
    ExternalArbitrator, ProviderConfig, ReasoningProvider, RetryPolicy, ScriptedProvider,
};
pub use selheal_metrics::MetricsSnapshot;
