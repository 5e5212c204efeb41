use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CardId, ColumnId};

/// How urgently a card needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parses a priority label, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields carried by a confirmed order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderDetails {
    pub purchase_order: Option<String>,
    pub customer: Option<String>,
    pub product_type: Option<String>,
    /// Reference of the quote this order was won from, if any.
    pub quote_reference: Option<String>,
    /// Set when the order was produced by winning a quote.
    #[serde(default)]
    pub converted_from_quote: bool,
}

/// Fields carried by a proposal that has not been won or lost yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteDetails {
    pub quote_reference: Option<String>,
    pub customer: Option<String>,
    pub product_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub customer: Option<String>,
    pub product_type: Option<String>,
}

/// The closed set of card kinds. Workflow rules dispatch on this tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardKind {
    Order(OrderDetails),
    Quote(QuoteDetails),
    Question,
    ServiceRequest(ServiceDetails),
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order(_) => "order",
            Self::Quote(_) => "quote",
            Self::Question => "question",
            Self::ServiceRequest(_) => "service_request",
        }
    }

    pub fn is_quote(&self) -> bool {
        matches!(self, Self::Quote(_))
    }

    pub fn customer(&self) -> Option<&str> {
        match self {
            Self::Order(d) => d.customer.as_deref(),
            Self::Quote(d) => d.customer.as_deref(),
            Self::ServiceRequest(d) => d.customer.as_deref(),
            Self::Question => None,
        }
    }

    pub fn quote_reference(&self) -> Option<&str> {
        match self {
            Self::Order(d) => d.quote_reference.as_deref(),
            Self::Quote(d) => d.quote_reference.as_deref(),
            _ => None,
        }
    }

    /// Converts a quote into the order it becomes when won.
    ///
    /// Returns `None` for any kind other than `Quote`.
    pub fn won(&self) -> Option<CardKind> {
        match self {
            Self::Quote(q) => Some(Self::Order(OrderDetails {
                purchase_order: None,
                customer: q.customer.clone(),
                product_type: q.product_type.clone(),
                quote_reference: q.quote_reference.clone(),
                converted_from_quote: true,
            })),
            _ => None,
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub column_id: ColumnId,
    /// Index within the owning column's card list.
    pub position: u32,
    pub kind: CardKind,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    /// Forward link to the mirror card living in the Escalations column.
    pub escalated_to_id: Option<CardId>,
}

impl Card {
    /// Creates an unplaced card; the store assigns its final position.
    pub fn new(
        id: impl Into<CardId>,
        title: impl Into<String>,
        kind: CardKind,
        column_id: impl Into<ColumnId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_id: column_id.into(),
            position: 0,
            kind,
            priority: Priority::default(),
            assignee: None,
            due_date: None,
            created_at: Utc::now(),
            archived_at: None,
            escalated_to_id: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Builds the escalated mirror of this card: same display fields, new
    /// identity, placed in `column_id`, no forward link of its own.
    pub fn mirror(&self, id: CardId, column_id: ColumnId, now: DateTime<Utc>) -> Card {
        Card {
            id,
            title: self.title.clone(),
            column_id,
            position: 0,
            kind: self.kind.clone(),
            priority: self.priority,
            assignee: self.assignee.clone(),
            due_date: self.due_date,
            created_at: now,
            archived_at: None,
            escalated_to_id: None,
        }
    }
}

/// A partial update of a card's editable fields.
///
/// The outer `Option` says whether a field is touched; for clearable fields
/// the inner `Option` is the new value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardPatch {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.due_date.is_none()
    }

    /// Returns a copy of `card` with this patch applied.
    pub fn apply_to(&self, card: &Card) -> Card {
        let mut updated = card.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(priority) = self.priority {
            updated.priority = priority;
        }
        if let Some(assignee) = &self.assignee {
            updated.assignee = assignee.clone();
        }
        if let Some(due) = self.due_date {
            updated.due_date = due;
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(reference: Option<&str>) -> CardKind {
        CardKind::Quote(QuoteDetails {
            quote_reference: reference.map(str::to_string),
            customer: Some("Acme".into()),
            product_type: Some("valves".into()),
        })
    }

    #[test]
    fn won_quote_becomes_order_carrying_fields() {
        let order = quote(Some("Q100")).won().unwrap();
        match order {
            CardKind::Order(d) => {
                assert_eq!(d.quote_reference.as_deref(), Some("Q100"));
                assert_eq!(d.customer.as_deref(), Some("Acme"));
                assert_eq!(d.product_type.as_deref(), Some("valves"));
                assert!(d.converted_from_quote);
                assert!(d.purchase_order.is_none());
            }
            other => panic!("expected order, got {other:?}"),
        }
    }

    #[test]
    fn only_quotes_can_be_won() {
        assert!(CardKind::Question.won().is_none());
        assert!(CardKind::Order(OrderDetails::default()).won().is_none());
    }

    #[test]
    fn mirror_copies_display_fields_only() {
        let mut card = Card::new("c3", "Broken pump", CardKind::Question, "new");
        card.priority = Priority::High;
        card.assignee = Some("dana".into());
        card.escalated_to_id = Some(CardId::from("old"));

        let now = Utc::now();
        let mirror = card.mirror(CardId::from("c4"), ColumnId::from("esc"), now);
        assert_eq!(mirror.id, CardId::from("c4"));
        assert_eq!(mirror.title, "Broken pump");
        assert_eq!(mirror.priority, Priority::High);
        assert_eq!(mirror.assignee.as_deref(), Some("dana"));
        assert_eq!(mirror.column_id, ColumnId::from("esc"));
        assert_eq!(mirror.created_at, now);
        assert!(mirror.escalated_to_id.is_none());
    }

    #[test]
    fn patch_clears_and_sets_fields() {
        let mut card = Card::new("c1", "Old", CardKind::Question, "new");
        card.assignee = Some("sam".into());

        let patch = CardPatch {
            title: Some("New".into()),
            assignee: Some(None),
            ..Default::default()
        };
        let updated = patch.apply_to(&card);
        assert_eq!(updated.title, "New");
        assert!(updated.assignee.is_none());
        assert_eq!(updated.priority, Priority::Medium);
        assert!(!patch.is_empty());
        assert!(CardPatch::default().is_empty());
    }

    #[test]
    fn kind_serializes_with_tag() {
        let json = serde_json::to_value(quote(Some("Q1"))).unwrap();
        assert_eq!(json["kind"], "quote");
        assert_eq!(json["quote_reference"], "Q1");
        let question: CardKind = serde_json::from_str(r#"{"kind":"question"}"#).unwrap();
        assert_eq!(question, CardKind::Question);
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::parse("low"), Some(Priority::Low));
        assert_eq!(Priority::parse("urgent"), None);
    }
}
