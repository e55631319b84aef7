//! Guard layer for the healing pipeline
//!
//! Two independent gates: a circuit breaker that disables arbitration
//! after sustained failure, and a guardrail policy applied to every
//! proposed heal before it is accepted.

mod breaker;
mod clock;
mod guardrail;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use guardrail::{BlacklistEntry, GuardrailConfig, GuardrailPolicy, Verdict};
