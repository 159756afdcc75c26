//! Admission layer: shared-token authentication and per-client rate limits.

mod middleware;
mod rate_limit;
mod token;

use thiserror::Error;

pub use middleware::{admission_middleware, presented_token, route_cost};
pub use rate_limit::{Decision, RateLimiter};
pub use token::{
    MIN_TOKEN_LEN, TOKEN_ALPHABET, TOKEN_HEADER, TOKEN_LEN, client_key, ct_eq, generate_token,
    token_from_query,
};

/// Why a request was turned away before reaching a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("missing token")]
    MissingToken,

    #[error("token mismatch")]
    TokenMismatch,

    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },
}
