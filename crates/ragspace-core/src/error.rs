use thiserror::Error;
use uuid::Uuid;

/// Typed error for every use-case boundary in the core.
///
/// Infrastructure variants carry an `error_id` so a client-facing message can
/// be correlated with server logs without leaking internals.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{resource} not found: {message}")]
    NotFound {
        resource: &'static str,
        message: String,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{resource} unavailable: {message}")]
    ServiceUnavailable {
        resource: &'static str,
        message: String,
    },

    #[error("database error [{error_id}]: {message}")]
    Database { error_id: Uuid, message: String },

    #[error("embedding error [{error_id}]: {message}")]
    Embedding {
        error_id: Uuid,
        message: String,
        status: Option<u16>,
    },

    #[error("llm error [{error_id}]: {message}")]
    Llm {
        error_id: Uuid,
        message: String,
        status: Option<u16>,
    },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn service_unavailable(resource: &'static str, message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            resource,
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            error_id: Uuid::new_v4(),
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            error_id: Uuid::new_v4(),
            message: message.into(),
            status: None,
        }
    }

    pub fn embedding_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Embedding {
            error_id: Uuid::new_v4(),
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            error_id: Uuid::new_v4(),
            message: message.into(),
            status: None,
        }
    }

    pub fn llm_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Llm {
            error_id: Uuid::new_v4(),
            message: message.into(),
            status: Some(status),
        }
    }

    /// Stable kind label for logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Llm { .. } => "LLM_ERROR",
        }
    }

    /// HTTP-ish status attached by a provider adapter, when known.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Embedding { status, .. } | Self::Llm { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(CoreError::validation("x").kind(), "VALIDATION_ERROR");
        assert_eq!(CoreError::not_found("Workspace", "w").kind(), "NOT_FOUND");
        assert_eq!(CoreError::database("boom").kind(), "DATABASE_ERROR");
    }

    #[test]
    fn provider_status_only_on_provider_errors() {
        assert_eq!(
            CoreError::embedding_with_status("429", 429).provider_status(),
            Some(429)
        );
        assert_eq!(CoreError::conflict("c").provider_status(), None);
    }
}
