//! Error types for port operations.

/// Persisted world store errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Store could not be reached. Callers may retry; the core never does.
    #[error("World store unavailable: {0}")]
    Unavailable(String),

    /// Record not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// A persisted row could not be turned back into a domain value.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Business constraint violated (e.g. duplicate primary key).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl RepoError {
    pub fn unavailable(message: impl ToString) -> Self {
        Self::Unavailable(message.to_string())
    }

    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    pub fn constraint(message: impl ToString) -> Self {
        Self::ConstraintViolation(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Connectivity failures are retryable; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// World storage engine errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("World storage unavailable: {0}")]
    Unavailable(String),

    #[error("World not found in storage: {0}")]
    WorldNotFound(String),

    #[error("World already exists in storage: {0}")]
    AlreadyExists(String),

    #[error("Storage I/O error in {operation}: {message}")]
    Io {
        operation: &'static str,
        message: String,
    },
}

impl StorageError {
    pub fn io(operation: &'static str, message: impl ToString) -> Self {
        Self::Io {
            operation,
            message: message.to_string(),
        }
    }
}

/// Authorization provider failed to answer.
///
/// The permission resolver treats this as "capability not held".
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors from reading role or grant configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(RepoError::unavailable("connection refused").is_retryable());
        assert!(!RepoError::database("insert", "syntax error").is_retryable());
        assert!(!RepoError::constraint("duplicate").is_retryable());
        assert!(!RepoError::not_found("World", "alpha").is_retryable());
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = RepoError::not_found("World", "alpha");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "World not found: alpha");
    }
}
