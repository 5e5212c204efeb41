//! Kanban card workflow engine.
//!
//! User intents are validated by the [`engine`], applied optimistically to
//! the [`store`], and confirmed against the persistence service through
//! [`sync`]. The [`reconcile::Reconciler`] ties these together and rolls the
//! board back when the service rejects a change.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod sync;
pub mod view;

#[cfg(test)]
mod fixtures;
