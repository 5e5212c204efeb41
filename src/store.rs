//! In-memory board snapshot with copy-on-write updates.
//!
//! The [`BoardStore`] owns the current [`Board`] behind an `Arc` and
//! publishes every replacement on a `tokio::sync::watch` channel, so views
//! see optimistic changes the moment they are applied. Snapshots are never
//! mutated in place: a captured snapshot stays valid for rollback no matter
//! what is applied afterwards.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::engine::Delta;
use crate::error::StoreError;
use crate::model::{
    Board, BoardId, Card, CardId, CardKind, Column, ColumnId, ColumnRole, OrderDetails, Priority,
    QuoteDetails, ServiceDetails,
};
use crate::sync::{BoardRecord, CaseRecord, ColumnRecord};

/// Column display names used to detect roles when the service does not
/// send an explicit role tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleNames {
    #[serde(default = "default_escalations")]
    pub escalations: String,
    #[serde(default = "default_deescalated")]
    pub deescalated: String,
}

fn default_escalations() -> String {
    "Escalations".to_string()
}

fn default_deescalated() -> String {
    "De-escalated".to_string()
}

impl Default for RoleNames {
    fn default() -> Self {
        Self {
            escalations: default_escalations(),
            deescalated: default_deescalated(),
        }
    }
}

impl RoleNames {
    fn role_for(&self, record: &ColumnRecord) -> ColumnRole {
        match record.role.as_deref().map(str::to_lowercase).as_deref() {
            Some("escalations") => return ColumnRole::Escalations,
            Some("deescalated") | Some("de-escalated") => return ColumnRole::Deescalated,
            Some("standard") => return ColumnRole::Standard,
            _ => {}
        }
        if record.name.eq_ignore_ascii_case(&self.escalations) {
            ColumnRole::Escalations
        } else if record.name.eq_ignore_ascii_case(&self.deescalated) {
            ColumnRole::Deescalated
        } else {
            ColumnRole::Standard
        }
    }
}

/// Holds the authoritative snapshot of one board.
#[derive(Debug)]
pub struct BoardStore {
    tx: watch::Sender<Option<Arc<Board>>>,
}

impl Default for BoardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replaces the snapshot wholesale with a normalized service record.
    pub fn load(&self, record: BoardRecord, roles: &RoleNames) -> Arc<Board> {
        let board = Arc::new(normalize(record, roles));
        debug!(board = %board.id, columns = board.columns.len(), "board loaded");
        self.tx.send_replace(Some(board.clone()));
        board
    }

    /// The current snapshot, if a board is loaded.
    pub fn snapshot(&self) -> Option<Arc<Board>> {
        self.tx.borrow().clone()
    }

    /// Reverts to a previously captured snapshot.
    pub fn restore(&self, snapshot: Arc<Board>) {
        self.tx.send_replace(Some(snapshot));
    }

    /// Applies `delta` to the current snapshot and publishes the result.
    pub fn apply(&self, delta: &Delta) -> Result<Arc<Board>, StoreError> {
        let current = self.snapshot().ok_or(StoreError::NotLoaded)?;
        let next = Arc::new(apply_delta(&current, delta)?);
        self.tx.send_replace(Some(next.clone()));
        Ok(next)
    }

    /// Swaps a provisional card id for the one the service assigned,
    /// including forward links that point at it.
    pub fn confirm_card_id(&self, provisional: &CardId, confirmed: CardId) -> Result<Arc<Board>, StoreError> {
        let current = self.snapshot().ok_or(StoreError::NotLoaded)?;
        let mut board = (*current).clone();
        let mut found = false;
        for card in board.columns.iter_mut().flat_map(|c| c.cards.iter_mut()) {
            if &card.id == provisional {
                card.id = confirmed.clone();
                found = true;
            }
            if card.escalated_to_id.as_ref() == Some(provisional) {
                card.escalated_to_id = Some(confirmed.clone());
            }
        }
        if !found {
            return Err(StoreError::UnknownCard(provisional.clone()));
        }
        let next = Arc::new(board);
        self.tx.send_replace(Some(next.clone()));
        Ok(next)
    }

    /// Swaps a provisional column id for the one the service assigned.
    pub fn confirm_column_id(
        &self,
        provisional: &ColumnId,
        confirmed: ColumnId,
    ) -> Result<Arc<Board>, StoreError> {
        let current = self.snapshot().ok_or(StoreError::NotLoaded)?;
        let mut board = (*current).clone();
        let column = column_mut(&mut board, provisional)?;
        column.id = confirmed;
        board.renumber();
        let next = Arc::new(board);
        self.tx.send_replace(Some(next.clone()));
        Ok(next)
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Board>>> {
        self.tx.subscribe()
    }
}

/// Returns a new board with `delta` applied; `board` is left untouched.
pub fn apply_delta(board: &Board, delta: &Delta) -> Result<Board, StoreError> {
    let mut next = board.clone();
    match delta {
        Delta::Move {
            card, to, position, ..
        } => {
            let moving = take_card(&mut next, card)?;
            insert_card(&mut next, to, moving, *position)?;
        }
        Delta::Edit { card, .. } => {
            let slot = card_mut(&mut next, &card.id)?;
            let (column_id, position) = (slot.column_id.clone(), slot.position);
            *slot = card.clone();
            slot.column_id = column_id;
            slot.position = position;
        }
        Delta::Escalate { source, mirror } => {
            card_mut(&mut next, source)?.escalated_to_id = Some(mirror.id.clone());
            let queue = mirror.column_id.clone();
            insert_card(&mut next, &queue, mirror.clone(), None)?;
        }
        Delta::Deescalate { mirror, to } => {
            let moving = take_card(&mut next, mirror)?;
            insert_card(&mut next, to, moving, None)?;
        }
        Delta::Win { card, .. } => {
            take_card(&mut next, &card.id)?;
            let target = card.column_id.clone();
            insert_card(&mut next, &target, card.clone(), None)?;
        }
        Delta::Lose { card, archived_at } => {
            card_mut(&mut next, card)?.archived_at = Some(*archived_at);
        }
        Delta::SwapColumns { column, neighbor } => {
            let a = column_index(&next, column)?;
            let b = column_index(&next, neighbor)?;
            next.columns.swap(a, b);
        }
        Delta::AddColumn { column } => {
            next.columns.push(column.clone());
        }
        Delta::UpdateColumn {
            column,
            name,
            color,
        } => {
            let col = column_mut(&mut next, column)?;
            if let Some(name) = name {
                col.name = name.clone();
            }
            if let Some(color) = color {
                col.color = color.clone();
            }
        }
        Delta::RemoveColumn { column, .. } => {
            let index = column_index(&next, column)?;
            next.columns.remove(index);
        }
    }
    next.renumber();
    Ok(next)
}

fn column_index(board: &Board, id: &ColumnId) -> Result<usize, StoreError> {
    board
        .column_index(id)
        .ok_or_else(|| StoreError::UnknownColumn(id.clone()))
}

fn column_mut<'a>(board: &'a mut Board, id: &ColumnId) -> Result<&'a mut Column, StoreError> {
    board
        .columns
        .iter_mut()
        .find(|c| &c.id == id)
        .ok_or_else(|| StoreError::UnknownColumn(id.clone()))
}

fn card_mut<'a>(board: &'a mut Board, id: &CardId) -> Result<&'a mut Card, StoreError> {
    board
        .columns
        .iter_mut()
        .flat_map(|c| c.cards.iter_mut())
        .find(|c| &c.id == id)
        .ok_or_else(|| StoreError::UnknownCard(id.clone()))
}

fn take_card(board: &mut Board, id: &CardId) -> Result<Card, StoreError> {
    for column in &mut board.columns {
        if let Some(index) = column.cards.iter().position(|c| &c.id == id) {
            return Ok(column.cards.remove(index));
        }
    }
    Err(StoreError::UnknownCard(id.clone()))
}

fn insert_card(
    board: &mut Board,
    column: &ColumnId,
    card: Card,
    position: Option<u32>,
) -> Result<(), StoreError> {
    let target = column_mut(board, column)?;
    let index = position
        .map(|p| (p as usize).min(target.cards.len()))
        .unwrap_or(target.cards.len());
    target.cards.insert(index, card);
    Ok(())
}

/// Builds the board model from the service's records: columns and cards
/// ordered by their recorded positions and renumbered 0..N-1, roles
/// resolved, card kinds decoded, dangling escalation links dropped.
pub fn normalize(record: BoardRecord, roles: &RoleNames) -> Board {
    let mut columns: Vec<ColumnRecord> = record.columns;
    columns.sort_by_key(|c| c.position);
    let contiguous = columns
        .iter()
        .enumerate()
        .all(|(i, c)| c.position == i as i64);
    if !contiguous {
        warn!(board = %record.id, "column positions were not contiguous, renumbering");
    }

    let columns: Vec<Column> = columns
        .into_iter()
        .map(|mut col| {
            let role = roles.role_for(&col);
            col.cases.sort_by_key(|c| c.position);
            let id = ColumnId::new(col.id);
            let cards = col
                .cases
                .into_iter()
                .map(|case| card_from_record(case, &id))
                .collect();
            Column {
                id,
                name: col.name,
                color: col.color.unwrap_or_default(),
                position: 0,
                is_final: col.is_final,
                role,
                cards,
            }
        })
        .collect();

    let mut board = Board::new(BoardId::new(record.id), record.name, columns);

    let known: Vec<CardId> = board.cards().map(|c| c.id.clone()).collect();
    for card in board.columns.iter_mut().flat_map(|c| c.cards.iter_mut()) {
        if let Some(link) = &card.escalated_to_id {
            if !known.contains(link) {
                warn!(card = %card.id, mirror = %link, "dropping escalation link to missing card");
                card.escalated_to_id = None;
            }
        }
    }
    board
}

fn card_from_record(record: CaseRecord, column: &ColumnId) -> Card {
    let kind = match record.case_type.to_lowercase().as_str() {
        "order" => CardKind::Order(OrderDetails {
            purchase_order: record.po_number,
            customer: record.customer_name,
            product_type: record.product_type,
            quote_reference: record.quote_reference,
            converted_from_quote: record.converted_from_quote,
        }),
        "quote" => CardKind::Quote(QuoteDetails {
            quote_reference: record.quote_reference,
            customer: record.customer_name,
            product_type: record.product_type,
        }),
        "service_request" | "servicerequest" | "service-request" => {
            CardKind::ServiceRequest(ServiceDetails {
                customer: record.customer_name,
                product_type: record.product_type,
            })
        }
        "question" => CardKind::Question,
        other => {
            warn!(case = %record.id, case_type = other, "unknown case type, treating as question");
            CardKind::Question
        }
    };

    let title = if record.title.trim().is_empty() {
        kind.customer().unwrap_or("Untitled").to_string()
    } else {
        record.title
    };

    Card {
        id: CardId::new(record.id),
        title,
        column_id: column.clone(),
        position: 0,
        kind,
        priority: record
            .priority
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or_default(),
        assignee: record.assignee,
        due_date: record.due_date,
        created_at: record.created_at.unwrap_or_else(Utc::now),
        archived_at: record.archived_at,
        escalated_to_id: record.escalated_to_id.map(CardId::new),
    }
}
