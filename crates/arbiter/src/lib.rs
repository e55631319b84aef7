//! External arbitration for healing decisions.
//!
//! Candidate sets that survive local scoring are forwarded to a
//! reasoning provider which returns a structured verdict. This crate
//! owns the provider abstraction, the prompt and response wire
//! formats, and the retry/fallback orchestration between providers.

pub mod arbiter;
pub mod errors;
pub mod http;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use arbiter::{Arbitration, ExternalArbitrator, RetryPolicy};
pub use errors::{ArbitrationError, ErrorClass, ParseError, ProviderError, ProviderFailure};
pub use http::HttpProvider;
pub use parse::parse_decision;
pub use prompt::build_prompt;
pub use provider::{ProviderConfig, ProviderResponse, ReasoningProvider, ScriptedProvider};
