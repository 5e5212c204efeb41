use chrono::{DateTime, Utc};
use tracing::debug;

use super::delta::Delta;
use super::intent::{Direction, Intent};
use crate::error::Rejection;
use crate::model::{Board, Card, CardId, CardPatch, Column, ColumnId, ColumnRole};

/// Outcome of evaluating an intent against a board.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Approved(Delta),
    Rejected(Rejection),
}

impl Decision {
    pub fn into_result(self) -> Result<Delta, Rejection> {
        match self {
            Decision::Approved(delta) => Ok(delta),
            Decision::Rejected(reason) => Err(reason),
        }
    }
}

/// What the engine may look at while deciding.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub board: &'a Board,
    /// Timestamp stamped on archived cards and new mirrors.
    pub now: DateTime<Utc>,
}

impl<'a> DecisionContext<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self::at(board, Utc::now())
    }

    pub fn at(board: &'a Board, now: DateTime<Utc>) -> Self {
        Self { board, now }
    }
}

/// Pure workflow rules: intent + board in, delta or rejection out.
pub struct TransitionEngine;

impl TransitionEngine {
    /// Decide whether `intent` is legal on the board in `ctx`.
    ///
    /// Never mutates anything. Ids for entities the delta creates (the
    /// escalation mirror, a new column) are provisional until the server
    /// confirms them.
    pub fn decide(intent: &Intent, ctx: &DecisionContext<'_>) -> Decision {
        let result = match intent {
            Intent::Move {
                card,
                column,
                position,
            } => Self::decide_move(ctx, card, column, *position),
            Intent::Escalate { card } => Self::decide_escalate(ctx, card),
            Intent::Deescalate { card } => Self::decide_deescalate(ctx, card),
            Intent::Win { card } => Self::decide_win(ctx, card),
            Intent::Lose { card } => Self::decide_lose(ctx, card),
            Intent::Edit { card, patch } => Self::decide_edit(ctx, card, patch),
            Intent::ReorderColumn { column, direction } => {
                Self::decide_reorder(ctx, column, *direction)
            }
            Intent::AddColumn { name, is_final } => Self::decide_add_column(ctx, name, *is_final),
            Intent::UpdateColumn {
                column,
                name,
                color,
            } => Self::decide_update_column(ctx, column, name.as_deref(), color.as_deref()),
            Intent::DeleteColumn { column } => Self::decide_delete_column(ctx, column),
        };

        match result {
            Ok(delta) => {
                debug!(intent = intent.name(), "transition approved");
                Decision::Approved(delta)
            }
            Err(reason) => {
                debug!(intent = intent.name(), %reason, "transition rejected");
                Decision::Rejected(reason)
            }
        }
    }

    fn decide_move(
        ctx: &DecisionContext<'_>,
        card_id: &CardId,
        target: &ColumnId,
        position: Option<u32>,
    ) -> Result<Delta, Rejection> {
        let card = live_card(ctx.board, card_id)?;
        ctx.board
            .column(target)
            .ok_or_else(|| Rejection::ColumnNotFound(target.clone()))?;

        if card.kind.is_quote() && &card.column_id != target {
            return Err(Rejection::InvalidTransition {
                card: card_id.clone(),
                reason: "quotes leave their column only by being won or lost",
            });
        }

        Ok(Delta::Move {
            card: card_id.clone(),
            from: card.column_id.clone(),
            to: target.clone(),
            position,
        })
    }

    fn decide_escalate(ctx: &DecisionContext<'_>, card_id: &CardId) -> Result<Delta, Rejection> {
        let card = live_card(ctx.board, card_id)?;
        if let Some(mirror) = &card.escalated_to_id {
            return Err(Rejection::AlreadyEscalated {
                card: card_id.clone(),
                mirror: mirror.clone(),
            });
        }

        let queue = role_column(ctx.board, ColumnRole::Escalations)?;
        let mirror = card.mirror(CardId::provisional(), queue.id.clone(), ctx.now);
        Ok(Delta::Escalate {
            source: card_id.clone(),
            mirror,
        })
    }

    fn decide_deescalate(
        ctx: &DecisionContext<'_>,
        card_id: &CardId,
    ) -> Result<Delta, Rejection> {
        let card = ctx
            .board
            .card(card_id)
            .ok_or_else(|| Rejection::CardNotFound(card_id.clone()))?;
        let queue = role_column(ctx.board, ColumnRole::Escalations)?;

        let mirror = match &card.escalated_to_id {
            Some(mirror) => {
                if !queue.cards.iter().any(|c| &c.id == mirror) {
                    return Err(Rejection::MirrorMissing {
                        card: card_id.clone(),
                        mirror: mirror.clone(),
                    });
                }
                mirror.clone()
            }
            // The mirror itself was picked from the queue.
            None if card.column_id == queue.id => card_id.clone(),
            None => return Err(Rejection::NotEscalated(card_id.clone())),
        };

        let target = role_column(ctx.board, ColumnRole::Deescalated)?;
        Ok(Delta::Deescalate {
            mirror,
            to: target.id.clone(),
        })
    }

    fn decide_win(ctx: &DecisionContext<'_>, card_id: &CardId) -> Result<Delta, Rejection> {
        let card = live_card(ctx.board, card_id)?;

        let found = ctx.board.columns.len();
        if found < 2 {
            return Err(Rejection::InsufficientColumns { required: 2, found });
        }

        let Some(kind) = card.kind.won() else {
            return Err(Rejection::NotAQuote {
                card: card_id.clone(),
                kind: card.kind.as_str(),
            });
        };
        quote_of_record(ctx.board, card)?;
        let Some(target) = ctx.board.column_at(1) else {
            return Err(Rejection::InsufficientColumns { required: 2, found });
        };

        let title = match card.kind.quote_reference() {
            Some(reference) => format!("{} (Ref: {reference})", card.title),
            None => card.title.clone(),
        };

        let mut won = card.clone();
        won.kind = kind;
        won.title = title;
        won.column_id = target.id.clone();

        Ok(Delta::Win {
            card: won,
            from: card.column_id.clone(),
        })
    }

    fn decide_lose(ctx: &DecisionContext<'_>, card_id: &CardId) -> Result<Delta, Rejection> {
        let card = live_card(ctx.board, card_id)?;
        if !card.kind.is_quote() {
            return Err(Rejection::NotAQuote {
                card: card_id.clone(),
                kind: card.kind.as_str(),
            });
        }
        quote_of_record(ctx.board, card)?;
        Ok(Delta::Lose {
            card: card_id.clone(),
            archived_at: ctx.now,
        })
    }

    fn decide_edit(
        ctx: &DecisionContext<'_>,
        card_id: &CardId,
        patch: &CardPatch,
    ) -> Result<Delta, Rejection> {
        let card = live_card(ctx.board, card_id)?;
        if patch.is_empty() {
            return Err(Rejection::NothingToChange);
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Rejection::EmptyName);
        }
        Ok(Delta::Edit {
            card: patch.apply_to(card),
            patch: patch.clone(),
        })
    }

    fn decide_reorder(
        ctx: &DecisionContext<'_>,
        column: &ColumnId,
        direction: Direction,
    ) -> Result<Delta, Rejection> {
        let index = ctx
            .board
            .column_index(column)
            .ok_or_else(|| Rejection::ColumnNotFound(column.clone()))?;

        let neighbor = match direction {
            Direction::Left => index.checked_sub(1),
            Direction::Right => Some(index + 1).filter(|&i| i < ctx.board.columns.len()),
        };
        let Some(neighbor) = neighbor else {
            return Err(Rejection::AtBoundary {
                column: column.clone(),
                direction,
            });
        };

        Ok(Delta::SwapColumns {
            column: column.clone(),
            neighbor: ctx.board.columns[neighbor].id.clone(),
        })
    }

    fn decide_add_column(
        ctx: &DecisionContext<'_>,
        name: &str,
        is_final: bool,
    ) -> Result<Delta, Rejection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        let mut column = Column::new(ColumnId::provisional(), name).with_final(is_final);
        column.position = ctx.board.columns.len() as u32;
        Ok(Delta::AddColumn { column })
    }

    fn decide_update_column(
        ctx: &DecisionContext<'_>,
        column: &ColumnId,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Delta, Rejection> {
        ctx.board
            .column(column)
            .ok_or_else(|| Rejection::ColumnNotFound(column.clone()))?;
        if name.is_none() && color.is_none() {
            return Err(Rejection::NothingToChange);
        }
        if name.is_some_and(|n| n.trim().is_empty()) {
            return Err(Rejection::EmptyName);
        }
        Ok(Delta::UpdateColumn {
            column: column.clone(),
            name: name.map(|n| n.trim().to_string()),
            color: color.map(str::to_string),
        })
    }

    fn decide_delete_column(
        ctx: &DecisionContext<'_>,
        column: &ColumnId,
    ) -> Result<Delta, Rejection> {
        let col = ctx
            .board
            .column(column)
            .ok_or_else(|| Rejection::ColumnNotFound(column.clone()))?;
        if !col.cards.is_empty() {
            return Err(Rejection::ColumnNotEmpty {
                column: column.clone(),
                cards: col.cards.len(),
            });
        }
        Ok(Delta::RemoveColumn {
            column: column.clone(),
            position: col.position,
        })
    }
}

fn live_card<'a>(board: &'a Board, id: &CardId) -> Result<&'a Card, Rejection> {
    let card = board
        .card(id)
        .ok_or_else(|| Rejection::CardNotFound(id.clone()))?;
    if card.is_archived() {
        return Err(Rejection::CardArchived(id.clone()));
    }
    Ok(card)
}

/// Quotes copied into the escalation queues are mirrors; only the card in a
/// workflow column can be won or lost.
fn quote_of_record(board: &Board, card: &Card) -> Result<(), Rejection> {
    let in_queue = board
        .column(&card.column_id)
        .is_some_and(|col| col.role != ColumnRole::Standard);
    if in_queue {
        return Err(Rejection::InvalidTransition {
            card: card.id.clone(),
            reason: "escalation mirrors cannot be won or lost",
        });
    }
    Ok(())
}

fn role_column(board: &Board, role: ColumnRole) -> Result<&Column, Rejection> {
    board
        .column_with_role(role)
        .ok_or(Rejection::MissingRoleColumn(role))
}
