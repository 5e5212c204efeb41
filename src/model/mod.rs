mod board;
mod card;
mod ids;

pub use board::{Board, CardState, Column, ColumnRole};
pub use card::{Card, CardKind, CardPatch, OrderDetails, Priority, QuoteDetails, ServiceDetails};
pub use ids::{BoardId, CardId, ColumnId};
