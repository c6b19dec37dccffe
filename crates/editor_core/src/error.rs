use shared::{domain::EntityId, error::RemoteError, schema::EntityKind};
use thiserror::Error;

pub use shared::schema::ValidationError;

use crate::draft::DraftState;

pub type EditorResult<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{kind} has no field named '{field}'")]
    InvalidField { kind: EntityKind, field: String },
    #[error("no row with id {0}")]
    NotFound(EntityId),
    #[error("row {0} already has a change in flight; retry once it settles")]
    Conflict(EntityId),
    #[error("{0}")]
    Remote(#[from] RemoteError),
    #[error("cannot {operation} while the editor is {state}")]
    InvalidState {
        operation: &'static str,
        state: DraftState,
    },
    #[error("a commit is already in flight")]
    Busy,
    #[error("editor context has no {0}")]
    MissingContext(&'static str),
    #[error("{kind} records do not support {operation}")]
    Unsupported {
        kind: EntityKind,
        operation: &'static str,
    },
}

impl EditorError {
    /// Errors that point at a caller bug rather than something the user did.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::InvalidField { .. }
                | Self::InvalidState { .. }
                | Self::MissingContext(_)
                | Self::Unsupported { .. }
        )
    }
}
