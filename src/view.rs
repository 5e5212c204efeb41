//! Read-only projections of a board snapshot for display.

use serde::Deserialize;

use crate::model::{Board, Card, CardState, Column, ColumnRole};

/// Display preferences. Passed in by the caller, never read from ambient
/// storage here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ViewPrefs {
    /// Column names to show first, in this order; matched case-insensitively.
    #[serde(default)]
    pub column_order: Vec<String>,

    #[serde(default)]
    pub show_archived: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CardView<'a> {
    pub card: &'a Card,
    pub state: CardState,
}

#[derive(Debug, Clone)]
pub struct ColumnView<'a> {
    pub column: &'a Column,
    pub cards: Vec<CardView<'a>>,
}

/// A mirror waiting in the escalations column, with the card it was
/// raised for when that card is still on the board.
#[derive(Debug, Clone, Copy)]
pub struct EscalationEntry<'a> {
    pub mirror: &'a Card,
    pub source: Option<&'a Card>,
}

/// The board as the user sees it.
#[derive(Debug, Clone)]
pub struct ActiveBoard<'a> {
    board: &'a Board,
    columns: Vec<ColumnView<'a>>,
}

impl<'a> ActiveBoard<'a> {
    pub fn new(board: &'a Board, prefs: &ViewPrefs) -> Self {
        let mut ordered: Vec<&Column> = board.columns.iter().collect();
        ordered.sort_by_key(|col| (preferred_rank(prefs, &col.name), col.position));

        let columns = ordered
            .into_iter()
            .map(|column| ColumnView {
                column,
                cards: column
                    .cards
                    .iter()
                    .filter(|card| prefs.show_archived || !card.is_archived())
                    .map(|card| CardView {
                        card,
                        state: board.state_of(card),
                    })
                    .collect(),
            })
            .collect();

        Self { board, columns }
    }

    pub fn board(&self) -> &'a Board {
        self.board
    }

    pub fn columns(&self) -> &[ColumnView<'a>] {
        &self.columns
    }

    pub fn escalation_queue(&self) -> Vec<EscalationEntry<'a>> {
        let board = self.board;
        let Some(queue) = board.column_with_role(ColumnRole::Escalations) else {
            return Vec::new();
        };
        queue
            .active_cards()
            .map(|mirror| EscalationEntry {
                mirror,
                source: board
                    .cards()
                    .find(|c| c.escalated_to_id.as_ref() == Some(&mirror.id)),
            })
            .collect()
    }

    /// Number of visible cards in `state`.
    pub fn count(&self, state: CardState) -> usize {
        self.columns
            .iter()
            .flat_map(|col| col.cards.iter())
            .filter(|view| view.state == state)
            .count()
    }
}

// Configured names rank by their index; everything else ranks after them.
fn preferred_rank(prefs: &ViewPrefs, name: &str) -> usize {
    prefs
        .column_order
        .iter()
        .position(|preferred| preferred.eq_ignore_ascii_case(name))
        .unwrap_or(prefs.column_order.len())
}
