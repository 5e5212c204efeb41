use chrono::{DateTime, Utc};

use crate::model::{Card, CardId, CardPatch, Column, ColumnId};

/// An approved state change, ready for the store to apply.
///
/// Deltas carry everything the store needs; applying one never consults
/// the transition rules again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Remove the card from `from` and insert it into `to` at `position`
    /// (append when `None`).
    Move {
        card: CardId,
        from: ColumnId,
        to: ColumnId,
        position: Option<u32>,
    },
    /// Replace the card's editable fields in place.
    Edit { card: Card, patch: CardPatch },
    /// Append `mirror` to its column and link `source` to it.
    Escalate { source: CardId, mirror: Card },
    /// Relocate the mirror to the de-escalated column. The source card's
    /// forward link is left as is.
    Deescalate { mirror: CardId, to: ColumnId },
    /// Replace the quote with its won form and append it to
    /// `card.column_id`.
    Win { card: Card, from: ColumnId },
    Lose {
        card: CardId,
        archived_at: DateTime<Utc>,
    },
    /// Swap the positions of two adjacent columns.
    SwapColumns { column: ColumnId, neighbor: ColumnId },
    /// Append a column at the end of the board.
    AddColumn { column: Column },
    UpdateColumn {
        column: ColumnId,
        name: Option<String>,
        color: Option<String>,
    },
    /// Remove an empty column; later columns shift down by one.
    RemoveColumn { column: ColumnId, position: u32 },
}
