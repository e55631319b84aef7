//! Arbitration error model
//!
//! Provider failures are classified so the retry loop knows which are
//! worth retrying and which should fail fast to the next provider.

use thiserror::Error;

/// Whether a failure is worth retrying against the same provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rate limits, timeouts, 5xx, connection resets.
    Transient,
    /// Auth failures, malformed requests, unsupported shapes.
    Terminal,
}

/// One failed provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("rate limited")]
    RateLimited,

    #[error("server error: http {0}")]
    ServerError(u16),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unsupported response shape: {0}")]
    UnsupportedShape(String),
}

impl ProviderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimited
            | ProviderError::ServerError(_)
            | ProviderError::ConnectionReset(_) => ErrorClass::Transient,
            ProviderError::Auth(_)
            | ProviderError::MalformedRequest(_)
            | ProviderError::UnsupportedShape(_) => ErrorClass::Terminal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Response parse failures, local to one call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("decision shape invalid: {0}")]
    InvalidDecision(String),
}

/// Why one provider in the chain gave up.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    #[error("provider '{name}' failed after {attempts} attempt(s): {last}")]
    CallFailed {
        name: String,
        attempts: u32,
        last: ProviderError,
    },

    #[error("provider '{name}' returned an unparseable response: {error}")]
    Unparseable { name: String, error: ParseError },
}

/// Pipeline-level arbitration failure.
#[derive(Debug, Error)]
pub enum ArbitrationError {
    #[error("no providers configured")]
    NoProviders,

    #[error("all {} provider(s) exhausted", failures.len())]
    Exhausted { failures: Vec<ProviderFailure> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_retry_policy() {
        assert!(ProviderError::Timeout(5000).is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::ServerError(503).is_retryable());
        assert!(ProviderError::ConnectionReset("peer".into()).is_retryable());

        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::MalformedRequest("schema".into()).is_retryable());
        assert!(!ProviderError::UnsupportedShape("html".into()).is_retryable());
    }
}
