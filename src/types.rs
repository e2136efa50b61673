//! Error types for the declaration core
//!
//! Declaration-path errors are returned synchronously to callers; they carry
//! a stable machine-readable code so clients can branch without parsing
//! message text. Aggregation-path failures never surface here, they are
//! logged by the weight engine.

/// Main error type for stance operations
#[derive(Debug, thiserror::Error)]
pub enum StanceError {
    /// Target family is not registered in the TargetRegistry
    #[error("Unknown target type: {0}")]
    UnknownTargetType(String),

    /// Referenced target id does not exist
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Duplicate kind within an exclusivity group for this user and target
    #[error("Already declared: {0}")]
    AlreadyDeclared(String),

    /// Cancel of a declaration that does not exist
    #[error("Not declared: {0}")]
    NotDeclared(String),

    /// Malformed caller input (non-positive weight, empty ids)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Event bus error: {0}")]
    Bus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StanceError {
    /// Stable error code for client-side branching
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTargetType(_) => "unknown_target_type",
            Self::TargetNotFound(_) => "target_not_found",
            Self::AlreadyDeclared(_) => "already_declared",
            Self::NotDeclared(_) => "not_declared",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Storage(_) => "storage_error",
            Self::Bus(_) => "bus_error",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP-equivalent status code for callers exposing this core over REST/RPC
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownTargetType(_) => 400,
            Self::TargetNotFound(_) => 404,
            Self::AlreadyDeclared(_) => 409,
            Self::NotDeclared(_) => 400,
            Self::InvalidArgument(_) => 400,
            Self::Storage(_) => 503,
            Self::Bus(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Whether the error is the caller's fault rather than an infrastructure fault
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500 && self.status_code() >= 400 && !matches!(self, Self::Storage(_))
    }
}

// Implement From conversions for common error types

impl From<mongodb::error::Error> for StanceError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StanceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<async_nats::Error> for StanceError {
    fn from(err: async_nats::Error) -> Self {
        Self::Bus(err.to_string())
    }
}

/// Result type alias for stance operations
pub type Result<T> = std::result::Result<T, StanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_codes() {
        assert_eq!(StanceError::AlreadyDeclared("x".into()).code(), "already_declared");
        assert_eq!(StanceError::NotDeclared("x".into()).code(), "not_declared");
        assert_eq!(StanceError::UnknownTargetType("x".into()).code(), "unknown_target_type");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(StanceError::AlreadyDeclared("x".into()).status_code(), 409);
        assert_eq!(StanceError::TargetNotFound("x".into()).status_code(), 404);
        assert_eq!(StanceError::NotDeclared("x".into()).status_code(), 400);
        assert_eq!(StanceError::Storage("x".into()).status_code(), 503);
    }

    #[test]
    fn test_client_error_classification() {
        assert!(StanceError::AlreadyDeclared("x".into()).is_client_error());
        assert!(!StanceError::Storage("down".into()).is_client_error());
    }

    #[test]
    fn test_bus_error_conversion() {
        let err: async_nats::Error = "connection reset".into();
        let converted = StanceError::from(err);
        assert_eq!(converted.code(), "bus_error");
        assert_eq!(converted.status_code(), 503);
    }
}
