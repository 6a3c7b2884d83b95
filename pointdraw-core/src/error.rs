//! Engine error taxonomy.
//!
//! Every domain error carries a class so a transport layer can map it to a
//! protocol status without the core knowing about transports.

use crate::entities::DrawingStatus;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Broad classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller's fault; retrying the same request will not help.
    Client,
    /// The operation lost to concurrent state; re-fetch and decide.
    Conflict,
    /// Transient or operational failure on our side.
    Server,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("cannot transition {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("drawing must be '{required}' (current: '{actual}')")]
    WrongStatus {
        required: DrawingStatus,
        actual: DrawingStatus,
    },

    #[error("drawing {drawing_id} already executed")]
    AlreadyExecuted { drawing_id: Uuid },

    /// A conditional update affected zero rows: a concurrent caller won.
    #[error("{entity} {id} was modified concurrently")]
    RaceLost { entity: &'static str, id: Uuid },

    #[error("insufficient points: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Validation(_) | EngineError::InsufficientBalance { .. } => {
                ErrorClass::Client
            }
            EngineError::NotFound { .. } => ErrorClass::Client,
            EngineError::InvalidTransition { .. }
            | EngineError::WrongStatus { .. }
            | EngineError::AlreadyExecuted { .. }
            | EngineError::RaceLost { .. } => ErrorClass::Conflict,
            EngineError::Persistence(_) => ErrorClass::Server,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_taxonomy() {
        assert_eq!(
            EngineError::Validation("bad".into()).class(),
            ErrorClass::Client
        );
        assert_eq!(
            EngineError::InsufficientBalance {
                required: 200,
                available: 100
            }
            .class(),
            ErrorClass::Client
        );
        assert_eq!(
            EngineError::AlreadyExecuted {
                drawing_id: Uuid::new_v4()
            }
            .class(),
            ErrorClass::Conflict
        );
        assert_eq!(
            EngineError::WrongStatus {
                required: DrawingStatus::Closed,
                actual: DrawingStatus::Draft,
            }
            .class(),
            ErrorClass::Conflict
        );
        assert_eq!(
            EngineError::Persistence(StoreError::Backend("down".into())).class(),
            ErrorClass::Server
        );
    }
}
