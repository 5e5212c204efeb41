use thiserror::Error;

use crate::engine::Direction;
use crate::model::{CardId, ColumnId, ColumnRole};
use crate::sync::SyncError;

/// Why the transition engine refused an intent.
///
/// Rejections are detected before anything changes: no store mutation, no
/// remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("invalid transition for card {card}: {reason}")]
    InvalidTransition { card: CardId, reason: &'static str },

    #[error("card {card} is already escalated (mirror {mirror})")]
    AlreadyEscalated { card: CardId, mirror: CardId },

    #[error("board needs at least {required} columns, found {found}")]
    InsufficientColumns { required: usize, found: usize },

    #[error("card {card} is a {kind}, only quotes can be won or lost")]
    NotAQuote { card: CardId, kind: &'static str },

    #[error("card {0} is not escalated")]
    NotEscalated(CardId),

    #[error("mirror {mirror} of card {card} is not in the escalations column")]
    MirrorMissing { card: CardId, mirror: CardId },

    #[error("board has no {0} column")]
    MissingRoleColumn(ColumnRole),

    #[error("card {0} is archived")]
    CardArchived(CardId),

    #[error("card not found: {0}")]
    CardNotFound(CardId),

    #[error("column not found: {0}")]
    ColumnNotFound(ColumnId),

    #[error("column {column} cannot move {direction}, it is already at the edge")]
    AtBoundary {
        column: ColumnId,
        direction: Direction,
    },

    #[error("column {column} still holds {cards} card(s)")]
    ColumnNotEmpty { column: ColumnId, cards: usize },

    #[error("name must not be empty")]
    EmptyName,

    #[error("nothing to change")]
    NothingToChange,
}

/// A delta referenced something the snapshot does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no card {0} in the current snapshot")]
    UnknownCard(CardId),

    #[error("no column {0} in the current snapshot")]
    UnknownColumn(ColumnId),

    #[error("no board loaded")]
    NotLoaded,
}

/// Everything a dispatched intent can end in, other than success.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The remote call failed after the optimistic apply; the snapshot was
    /// restored.
    #[error("{operation} failed to sync and was reverted: {source}")]
    SyncFailure {
        operation: &'static str,
        #[source]
        source: SyncError,
    },

    /// Some of a multi-call column update reached the server and some did
    /// not. The local snapshot was restored but the remote positions are no
    /// longer consistent with it; a reload is required.
    #[error("column update partially applied on the server (changed: {changed:?}, failed: {failed:?}); reload required: {source}")]
    PartialReorderFailure {
        changed: Vec<ColumnId>,
        failed: Option<ColumnId>,
        #[source]
        source: SyncError,
    },

    /// Loading or reloading the board from the service failed. Nothing was
    /// applied.
    #[error("failed to fetch board: {0}")]
    Fetch(#[source] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// True when the change appeared locally and was then reverted.
    pub fn was_reverted(&self) -> bool {
        matches!(
            self,
            WorkflowError::SyncFailure { .. } | WorkflowError::PartialReorderFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_display() {
        let err = Rejection::InsufficientColumns {
            required: 2,
            found: 1,
        };
        assert_eq!(err.to_string(), "board needs at least 2 columns, found 1");

        let err = Rejection::AtBoundary {
            column: ColumnId::from("new"),
            direction: Direction::Left,
        };
        assert_eq!(
            err.to_string(),
            "column new cannot move left, it is already at the edge"
        );
    }

    #[test]
    fn rejection_converts_into_workflow_error() {
        let err: WorkflowError = Rejection::EmptyName.into();
        assert!(matches!(err, WorkflowError::Rejected(Rejection::EmptyName)));
        assert!(!err.was_reverted());
    }

    #[test]
    fn sync_failure_counts_as_reverted() {
        let err = WorkflowError::SyncFailure {
            operation: "move",
            source: SyncError::Api {
                status: 500,
                message: "boom".into(),
            },
        };
        assert!(err.was_reverted());
        assert_eq!(
            err.to_string(),
            "move failed to sync and was reverted: API error (status 500): boom"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkflowError>();
    }
}
