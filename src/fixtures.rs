//! Shared boards for unit tests.

use crate::model::{
    Board, Card, CardId, CardKind, Column, ColumnRole, OrderDetails, QuoteDetails,
};
use crate::sync::{BoardRecord, CaseRecord, ColumnRecord};

pub(crate) fn order(id: &str, column: &str) -> Card {
    Card::new(id, format!("Order {id}"), CardKind::Order(OrderDetails::default()), column)
}

pub(crate) fn quote(id: &str, column: &str, reference: Option<&str>) -> Card {
    Card::new(
        id,
        format!("Quote {id}"),
        CardKind::Quote(QuoteDetails {
            quote_reference: reference.map(str::to_string),
            customer: Some("Acme".into()),
            product_type: None,
        }),
        column,
    )
}

/// `New(0) Progress(1) Review(2) Done(3)` with no special columns.
pub(crate) fn four_columns(new_cards: Vec<Card>) -> Board {
    Board::new(
        "b1",
        "Sales",
        vec![
            Column::new("new", "New").with_cards(new_cards),
            Column::new("progress", "Progress"),
            Column::new("review", "Review"),
            Column::new("done", "Done").with_final(true),
        ],
    )
}

/// The four workflow columns plus Escalations and De-escalated queues.
pub(crate) fn with_queues(new_cards: Vec<Card>) -> Board {
    let mut board = four_columns(new_cards);
    board
        .columns
        .push(Column::new("esc", "Escalations").with_role(ColumnRole::Escalations));
    board
        .columns
        .push(Column::new("deesc", "De-escalated").with_role(ColumnRole::Deescalated));
    board.renumber();
    board
}

pub(crate) fn card<'a>(board: &'a Board, id: &str) -> &'a Card {
    board
        .card(&CardId::from(id))
        .unwrap_or_else(|| panic!("card {id} missing"))
}

pub(crate) fn card_ids(board: &Board, column: &str) -> Vec<String> {
    board
        .column(&column.into())
        .map(|c| c.cards.iter().map(|card| card.id.to_string()).collect())
        .unwrap_or_default()
}

/// The service record a board would have been loaded from.
pub(crate) fn record_of(board: &Board) -> BoardRecord {
    BoardRecord {
        id: board.id.to_string(),
        name: board.name.clone(),
        columns: board
            .columns
            .iter()
            .map(|col| ColumnRecord {
                id: col.id.to_string(),
                name: col.name.clone(),
                color: Some(col.color.clone()),
                position: col.position as i64,
                is_final: col.is_final,
                role: Some(
                    match col.role {
                        ColumnRole::Standard => "standard",
                        ColumnRole::Escalations => "escalations",
                        ColumnRole::Deescalated => "deescalated",
                    }
                    .to_string(),
                ),
                cases: col.cards.iter().map(case_of).collect(),
            })
            .collect(),
    }
}

fn case_of(card: &Card) -> CaseRecord {
    let mut record = CaseRecord {
        id: card.id.to_string(),
        title: card.title.clone(),
        case_type: card.kind.as_str().to_string(),
        position: card.position as i64,
        column_id: Some(card.column_id.to_string()),
        priority: Some(card.priority.as_str().to_string()),
        assignee: card.assignee.clone(),
        due_date: card.due_date,
        created_at: Some(card.created_at),
        archived_at: card.archived_at,
        escalated_to_id: card.escalated_to_id.as_ref().map(|id| id.to_string()),
        ..Default::default()
    };
    match &card.kind {
        CardKind::Order(d) => {
            record.po_number = d.purchase_order.clone();
            record.customer_name = d.customer.clone();
            record.product_type = d.product_type.clone();
            record.quote_reference = d.quote_reference.clone();
            record.converted_from_quote = d.converted_from_quote;
        }
        CardKind::Quote(d) => {
            record.quote_reference = d.quote_reference.clone();
            record.customer_name = d.customer.clone();
            record.product_type = d.product_type.clone();
        }
        CardKind::ServiceRequest(d) => {
            record.customer_name = d.customer.clone();
            record.product_type = d.product_type.clone();
        }
        CardKind::Question => {}
    }
    record
}
