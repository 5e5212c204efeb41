use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Board, CardId, CardPatch, ColumnId};

/// Which neighbour a column swaps places with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// A user intent. Front ends emit these and nothing else; the transition
/// engine decides whether each one is legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Relocate a card. `position: None` appends to the target column.
    Move {
        card: CardId,
        column: ColumnId,
        position: Option<u32>,
    },
    Escalate {
        card: CardId,
    },
    /// Accepts either the escalated source card or its mirror.
    Deescalate {
        card: CardId,
    },
    Win {
        card: CardId,
    },
    Lose {
        card: CardId,
    },
    Edit {
        card: CardId,
        patch: CardPatch,
    },
    ReorderColumn {
        column: ColumnId,
        direction: Direction,
    },
    AddColumn {
        name: String,
        is_final: bool,
    },
    UpdateColumn {
        column: ColumnId,
        name: Option<String>,
        color: Option<String>,
    },
    DeleteColumn {
        column: ColumnId,
    },
}

impl Intent {
    /// Short operation name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Move { .. } => "move",
            Intent::Escalate { .. } => "escalate",
            Intent::Deescalate { .. } => "deescalate",
            Intent::Win { .. } => "win",
            Intent::Lose { .. } => "lose",
            Intent::Edit { .. } => "edit",
            Intent::ReorderColumn { .. } => "reorder column",
            Intent::AddColumn { .. } => "add column",
            Intent::UpdateColumn { .. } => "update column",
            Intent::DeleteColumn { .. } => "delete column",
        }
    }
}

/// Where a dragged card was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty area of a column: append.
    Column(ColumnId),
    /// On top of another card: take that card's place.
    Card(CardId),
}

/// Translates a drag-and-drop gesture into a `Move` intent.
///
/// Returns `None` when the drop target is not on the board or the card was
/// dropped onto itself.
pub fn intent_for_drop(board: &Board, card: &CardId, target: &DropTarget) -> Option<Intent> {
    match target {
        DropTarget::Column(column) => {
            board.column(column)?;
            Some(Intent::Move {
                card: card.clone(),
                column: column.clone(),
                position: None,
            })
        }
        DropTarget::Card(other) if other == card => None,
        DropTarget::Card(other) => {
            let over = board.card(other)?;
            Some(Intent::Move {
                card: card.clone(),
                column: over.column_id.clone(),
                position: Some(over.position),
            })
        }
    }
}
