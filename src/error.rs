//! Single error taxonomy shared by every component in this crate.

use thiserror::Error;

/// The eight error kinds every fallible operation in this crate can return.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("cryptographic check failed: {0}")]
    Cryptographic(String),

    #[error("scope error: {0}")]
    ScopeError(String),

    #[error("policy rejected: {0}")]
    PolicyReject(String),
}

impl CoreError {
    /// Stable machine-readable tag for the error kind, independent of the message text.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::AlreadyExists(_) => "ALREADY_EXISTS",
            CoreError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            CoreError::StateViolation(_) => "STATE_VIOLATION",
            CoreError::Cryptographic(_) => "CRYPTOGRAPHIC",
            CoreError::ScopeError(_) => "SCOPE_ERROR",
            CoreError::PolicyReject(_) => "POLICY_REJECT",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_regardless_of_message() {
        let a = CoreError::NotFound("chain 1".into());
        let b = CoreError::NotFound("rollup 7".into());
        assert_eq!(a.code(), b.code());
        assert_eq!(a.code(), "NOT_FOUND");
    }
}
