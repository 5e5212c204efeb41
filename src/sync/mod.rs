pub mod client;
pub mod error;
pub mod plan;
pub mod types;

pub use client::HttpBoardService;
pub use error::SyncError;
pub use plan::{RemoteAck, RemoteCall, SyncPlan};
pub use types::{
    BoardRecord, CasePatch, CaseRecord, ColumnPatch, ColumnRecord, CreateColumnRequest,
    MoveCaseRequest,
};

use crate::model::{BoardId, CardId, ColumnId};

/// The persistence service as the workflow core sees it.
///
/// Implemented over HTTP by [`HttpBoardService`]; tests substitute mocks.
#[allow(async_fn_in_trait)]
pub trait BoardService {
    async fn fetch_board(&self, board: &BoardId) -> Result<BoardRecord, SyncError>;

    async fn move_case(&self, case: &CardId, body: &MoveCaseRequest) -> Result<(), SyncError>;

    async fn update_case(&self, case: &CardId, patch: &CasePatch)
    -> Result<CaseRecord, SyncError>;

    /// Returns the mirror case the service created.
    async fn escalate_case(&self, case: &CardId) -> Result<CaseRecord, SyncError>;

    async fn deescalate_case(&self, case: &CardId) -> Result<(), SyncError>;

    async fn update_column(
        &self,
        board: &BoardId,
        column: &ColumnId,
        patch: &ColumnPatch,
    ) -> Result<ColumnRecord, SyncError>;

    async fn delete_column(&self, board: &BoardId, column: &ColumnId) -> Result<(), SyncError>;

    async fn create_column(
        &self,
        board: &BoardId,
        body: &CreateColumnRequest,
    ) -> Result<ColumnRecord, SyncError>;
}
