use std::fmt;

use serde::{Deserialize, Serialize};

use super::card::{Card, CardKind};
use super::ids::{BoardId, CardId, ColumnId};

/// Stable role tag for columns the workflow treats specially.
///
/// Roles are resolved once at load time and survive column renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    #[default]
    Standard,
    /// Review queue that receives escalation mirrors.
    Escalations,
    /// Where mirrors go once the escalation is withdrawn.
    Deescalated,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRole::Standard => write!(f, "standard"),
            ColumnRole::Escalations => write!(f, "escalations"),
            ColumnRole::Deescalated => write!(f, "de-escalated"),
        }
    }
}

/// An ordered pipeline stage holding ordered cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub color: String,
    /// Index within the board; board positions form 0..N-1.
    pub position: u32,
    pub is_final: bool,
    pub role: ColumnRole,
    pub cards: Vec<Card>,
}

impl Column {
    pub fn new(id: impl Into<ColumnId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: String::new(),
            position: 0,
            is_final: false,
            role: ColumnRole::Standard,
            cards: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: ColumnRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_final(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }

    pub fn with_cards(mut self, cards: Vec<Card>) -> Self {
        self.cards = cards;
        self
    }

    /// Cards that are not archived, in column order.
    pub fn active_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| !c.is_archived())
    }
}

/// Derived lifecycle state of a card, used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    New,
    InProgress,
    Escalated,
    Won,
    /// Archived quote. Terminal.
    Lost,
    Archived,
    /// Sits in a column marked final. Terminal.
    Done,
}

impl CardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CardState::Lost | CardState::Done)
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardState::New => "NEW",
            CardState::InProgress => "IN_PROGRESS",
            CardState::Escalated => "ESCALATED",
            CardState::Won => "WON",
            CardState::Lost => "LOST",
            CardState::Archived => "ARCHIVED",
            CardState::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// Top-level container of ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    /// Kept sorted by `position`.
    pub columns: Vec<Column>,
}

impl Board {
    /// Builds a board from columns in the given order, renumbering positions.
    pub fn new(id: impl Into<BoardId>, name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut board = Self {
            id: id.into(),
            name: name.into(),
            columns,
        };
        board.renumber();
        board
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| &c.id == id)
    }

    /// The column at board position `position`.
    pub fn column_at(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }

    pub fn column_with_role(&self, role: ColumnRole) -> Option<&Column> {
        self.columns.iter().find(|c| c.role == role)
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards().find(|c| &c.id == id)
    }

    /// All cards on the board, archived included, in board order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.columns.iter().flat_map(|col| col.cards.iter())
    }

    /// Restores the contiguous-position invariants after a structural edit:
    /// columns are numbered by list order, cards by list order within their
    /// column, and every card's `column_id` names its owner.
    pub fn renumber(&mut self) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.position = i as u32;
            for (j, card) in column.cards.iter_mut().enumerate() {
                card.position = j as u32;
                card.column_id = column.id.clone();
            }
        }
    }

    /// True when column and card positions are exactly 0..N-1 in list order.
    pub fn positions_are_contiguous(&self) -> bool {
        self.columns.iter().enumerate().all(|(i, col)| {
            col.position == i as u32
                && col
                    .cards
                    .iter()
                    .enumerate()
                    .all(|(j, card)| card.position == j as u32 && card.column_id == col.id)
        })
    }

    /// Derives where a card sits in its lifecycle.
    pub fn state_of(&self, card: &Card) -> CardState {
        if card.is_archived() {
            return if card.kind.is_quote() {
                CardState::Lost
            } else {
                CardState::Archived
            };
        }

        let column = self.column(&card.column_id);
        if column.is_some_and(|c| c.is_final) {
            return CardState::Done;
        }
        if let CardKind::Order(details) = &card.kind {
            if details.converted_from_quote {
                return CardState::Won;
            }
        }
        if self.is_escalated(card) {
            return CardState::Escalated;
        }
        if column.is_some_and(|c| c.position == 0) {
            CardState::New
        } else {
            CardState::InProgress
        }
    }

    /// Column membership decides escalation: a card counts as escalated
    /// while its mirror still sits in the Escalations column.
    pub fn is_escalated(&self, card: &Card) -> bool {
        let Some(mirror_id) = &card.escalated_to_id else {
            return false;
        };
        self.column_with_role(ColumnRole::Escalations)
            .is_some_and(|col| col.cards.iter().any(|c| &c.id == mirror_id))
    }
}
