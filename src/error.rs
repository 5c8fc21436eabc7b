use serde_json::json;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure kinds surfaced by every engine operation.
///
/// None of these are fatal: the IPC layer maps each one onto an error
/// envelope and keeps serving requests.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A uniqueness or overlap rule rejected the write.
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A referenced entity does not resolve.
    #[error("{what} not found")]
    NotFound { what: String },

    /// Malformed identifier or out-of-range value.
    #[error("{message}")]
    InvalidInput { message: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wire code used in the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::InvalidInput { .. } => "bad_params",
            Self::Store(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Conflict { details, .. } => details.clone(),
            Self::NotFound { what } => Some(json!({ "entity": what })),
            _ => None,
        }
    }
}

/// Maps a UNIQUE / PRIMARY KEY violation that slipped past an explicit check
/// onto `Conflict`; everything else stays a store error.
pub fn map_constraint(e: rusqlite::Error, message: &str) -> EngineError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            EngineError::conflict(message)
        }
        _ => EngineError::Store(e),
    }
}
