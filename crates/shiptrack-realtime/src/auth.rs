//! Token verification seam for the gateway
//!
//! Token issuance and session management live outside this crate; the
//! gateway only consumes verification. A missing token is not an error
//! (the connection proceeds anonymously), but a token that fails to
//! verify must be answered with an error event and a forced close.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
}

/// Verifies a bearer token and yields the user id it belongs to
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Fixed token -> user map
///
/// For development and tests; deployments plug a JWT verifier in through
/// the trait.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
