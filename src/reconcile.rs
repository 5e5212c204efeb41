use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::engine::{Delta, DecisionContext, Intent, TransitionEngine};
use crate::error::{StoreError, WorkflowError};
use crate::model::{Board, BoardId, CardId, ColumnId};
use crate::store::{BoardStore, RoleNames};
use crate::sync::{BoardService, RemoteAck, RemoteCall, SyncError, SyncPlan};

/// How far a failed plan got before it stopped.
#[derive(Debug)]
enum PushFailure {
    /// No call reached the service.
    Nothing(SyncError),
    /// Some column calls were applied remotely before one failed.
    Partial {
        changed: Vec<ColumnId>,
        failed: Option<ColumnId>,
        source: SyncError,
    },
}

/// Drives every user intent through decide → optimistic apply → remote
/// confirmation → keep or roll back.
pub struct Reconciler<S> {
    service: S,
    store: BoardStore,
    roles: RoleNames,
    needs_reload: AtomicBool,
}

impl<S: BoardService> Reconciler<S> {
    pub fn new(service: S, roles: RoleNames) -> Self {
        Self {
            service,
            store: BoardStore::new(),
            roles,
            needs_reload: AtomicBool::new(false),
        }
    }

    /// The current snapshot, optimistic changes included.
    pub fn board(&self) -> Option<Arc<Board>> {
        self.store.snapshot()
    }

    /// Set after a partially applied column update; local and remote
    /// positions disagree until the next [`reload`](Self::reload).
    pub fn needs_reload(&self) -> bool {
        self.needs_reload.load(Ordering::Relaxed)
    }

    /// Fetches `board` from the service and replaces the snapshot wholesale.
    pub async fn load(&self, board: &BoardId) -> Result<Arc<Board>, WorkflowError> {
        let record = self
            .service
            .fetch_board(board)
            .await
            .map_err(WorkflowError::Fetch)?;
        let loaded = self.store.load(record, &self.roles);
        self.needs_reload.store(false, Ordering::Relaxed);
        info!(board = %loaded.id, columns = loaded.columns.len(), "board loaded");
        Ok(loaded)
    }

    /// Refetches the currently loaded board.
    pub async fn reload(&self) -> Result<Arc<Board>, WorkflowError> {
        let current = self.store.snapshot().ok_or(StoreError::NotLoaded)?;
        self.load(&current.id).await
    }

    /// Runs one intent through the workflow.
    ///
    /// Rejections return before anything changes. An approved delta is
    /// applied and published before the first remote call is awaited; if
    /// the service then fails, the pre-intent snapshot is restored and the
    /// failure returned.
    ///
    /// Dispatches are not serialized: two intents in flight at once can
    /// race, and a rollback restores the snapshot its own intent captured.
    pub async fn dispatch(&self, intent: Intent) -> Result<Arc<Board>, WorkflowError> {
        let snapshot = self.store.snapshot().ok_or(StoreError::NotLoaded)?;
        let delta =
            TransitionEngine::decide(&intent, &DecisionContext::new(&snapshot)).into_result()?;

        let applied = self.store.apply(&delta)?;
        let plan = SyncPlan::for_delta(&delta, &applied);

        match self.push(&snapshot.id, &plan).await {
            Ok(acks) => {
                self.confirm_ids(&delta, &acks);
                info!(intent = intent.name(), "change confirmed");
                Ok(self.store.snapshot().ok_or(StoreError::NotLoaded)?)
            }
            Err(failure) => {
                self.store.restore(snapshot);
                Err(self.report(intent.name(), failure))
            }
        }
    }

    async fn push(&self, board: &BoardId, plan: &SyncPlan) -> Result<Vec<RemoteAck>, PushFailure> {
        match plan {
            SyncPlan::Single(call) => call
                .execute(&self.service, board)
                .await
                .map(|ack| vec![ack])
                .map_err(PushFailure::Nothing),

            SyncPlan::Paired(first, second) => {
                let (a, b) = tokio::join!(
                    first.execute(&self.service, board),
                    second.execute(&self.service, board)
                );
                match (a, b) {
                    (Ok(a), Ok(b)) => Ok(vec![a, b]),
                    (Err(err), Err(other)) => {
                        warn!(error = %other, "second paired call also failed");
                        Err(PushFailure::Nothing(err))
                    }
                    (Ok(_), Err(err)) => Err(partial(&[first], second, err)),
                    (Err(err), Ok(_)) => Err(partial(&[second], first, err)),
                }
            }

            SyncPlan::Sequence(calls) => {
                let mut acks = Vec::with_capacity(calls.len());
                for (i, call) in calls.iter().enumerate() {
                    match call.execute(&self.service, board).await {
                        Ok(ack) => acks.push(ack),
                        Err(err) if i == 0 => return Err(PushFailure::Nothing(err)),
                        Err(err) => {
                            let done: Vec<&RemoteCall> = calls[..i].iter().collect();
                            return Err(partial(&done, call, err));
                        }
                    }
                }
                Ok(acks)
            }
        }
    }

    /// Replaces provisional ids with the ones the service assigned.
    fn confirm_ids(&self, delta: &Delta, acks: &[RemoteAck]) {
        let result = match (delta, acks.first()) {
            (Delta::Escalate { mirror, .. }, Some(RemoteAck::Case(record)))
                if !record.id.is_empty() && record.id != mirror.id.as_str() =>
            {
                self.store
                    .confirm_card_id(&mirror.id, CardId::new(record.id.clone()))
                    .map(|_| ())
            }
            (Delta::AddColumn { column }, Some(RemoteAck::Column(record)))
                if !record.id.is_empty() && record.id != column.id.as_str() =>
            {
                self.store
                    .confirm_column_id(&column.id, ColumnId::new(record.id.clone()))
                    .map(|_| ())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            warn!(error = %err, "could not swap in server-assigned id");
        }
    }

    fn report(&self, operation: &'static str, failure: PushFailure) -> WorkflowError {
        match failure {
            PushFailure::Nothing(source) => {
                warn!(operation, error = %source, "sync failed, change reverted");
                WorkflowError::SyncFailure { operation, source }
            }
            PushFailure::Partial {
                changed,
                failed,
                source,
            } => {
                self.needs_reload.store(true, Ordering::Relaxed);
                warn!(
                    operation,
                    ?changed,
                    ?failed,
                    error = %source,
                    "column update partially applied remotely, reload required"
                );
                WorkflowError::PartialReorderFailure {
                    changed,
                    failed,
                    source,
                }
            }
        }
    }
}

fn partial(done: &[&RemoteCall], failed: &RemoteCall, source: SyncError) -> PushFailure {
    PushFailure::Partial {
        changed: done.iter().filter_map(|c| c.column()).cloned().collect(),
        failed: failed.column().cloned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Direction;
    use crate::error::Rejection;
    use crate::fixtures::{card, card_ids, four_columns, order, quote, record_of, with_queues};
    use crate::model::{CardKind, CardPatch, Priority};
    use crate::sync::{
        BoardRecord, CasePatch, CaseRecord, ColumnPatch, ColumnRecord, CreateColumnRequest,
        MoveCaseRequest,
    };
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// In-memory service: fails the named operations, records every call and
    /// the snapshot the store had published when it arrived.
    #[derive(Default)]
    struct MockService {
        board: BoardRecord,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
        observer: Mutex<Option<watch::Receiver<Option<Arc<Board>>>>>,
        seen: Mutex<Vec<Arc<Board>>>,
    }

    impl MockService {
        fn new(board: &Board) -> Self {
            Self {
                board: record_of(board),
                ..Default::default()
            }
        }

        fn failing(mut self, ops: &[&str]) -> Self {
            self.failing = ops.iter().map(|s| s.to_string()).collect();
            self
        }

        fn record(&self, call: String) -> Result<(), SyncError> {
            if let Some(rx) = self.observer.lock().unwrap().as_ref() {
                if let Some(board) = rx.borrow().clone() {
                    self.seen.lock().unwrap().push(board);
                }
            }
            let fail = self.failing.contains(&call)
                || self
                    .failing
                    .contains(call.split(' ').next().unwrap_or_default());
            self.calls.lock().unwrap().push(call);
            if fail {
                Err(SyncError::Api {
                    status: 500,
                    message: "injected failure".into(),
                })
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BoardService for MockService {
        async fn fetch_board(&self, board: &BoardId) -> Result<BoardRecord, SyncError> {
            self.record(format!("fetch_board {board}"))?;
            Ok(self.board.clone())
        }

        async fn move_case(&self, case: &CardId, body: &MoveCaseRequest) -> Result<(), SyncError> {
            self.record(format!("move_case {case} {} {}", body.column_id, body.position))
        }

        async fn update_case(
            &self,
            case: &CardId,
            _patch: &CasePatch,
        ) -> Result<CaseRecord, SyncError> {
            self.record(format!("update_case {case}"))?;
            Ok(CaseRecord {
                id: case.to_string(),
                ..Default::default()
            })
        }

        async fn escalate_case(&self, case: &CardId) -> Result<CaseRecord, SyncError> {
            self.record(format!("escalate_case {case}"))?;
            Ok(CaseRecord {
                id: "c4".into(),
                ..Default::default()
            })
        }

        async fn deescalate_case(&self, case: &CardId) -> Result<(), SyncError> {
            self.record(format!("deescalate_case {case}"))
        }

        async fn update_column(
            &self,
            _board: &BoardId,
            column: &ColumnId,
            patch: &ColumnPatch,
        ) -> Result<ColumnRecord, SyncError> {
            self.record(format!("update_column {column}"))?;
            Ok(ColumnRecord {
                id: column.to_string(),
                position: patch.position.unwrap_or_default() as i64,
                ..Default::default()
            })
        }

        async fn delete_column(&self, _board: &BoardId, column: &ColumnId) -> Result<(), SyncError> {
            self.record(format!("delete_column {column}"))
        }

        async fn create_column(
            &self,
            _board: &BoardId,
            body: &CreateColumnRequest,
        ) -> Result<ColumnRecord, SyncError> {
            self.record(format!("create_column {}", body.name))?;
            Ok(ColumnRecord {
                id: "col-server".into(),
                name: body.name.clone(),
                position: body.position as i64,
                ..Default::default()
            })
        }
    }

    async fn reconciler(service: MockService) -> Reconciler<MockService> {
        let rec = Reconciler::new(service, RoleNames::default());
        rec.load(&"b1".into()).await.unwrap();
        *rec.service.observer.lock().unwrap() = Some(rec.store.subscribe());
        rec.service.calls.lock().unwrap().clear();
        rec
    }

    fn move_to(card: &str, column: &str) -> Intent {
        Intent::Move {
            card: card.into(),
            column: column.into(),
            position: None,
        }
    }

    #[tokio::test]
    async fn move_order_to_progress() {
        let mut board = four_columns(vec![order("c1", "new"), order("c0", "new")]);
        board.columns[1].cards.push(order("c9", "progress"));
        board.renumber();
        let rec = reconciler(MockService::new(&board)).await;

        let after = rec.dispatch(move_to("c1", "progress")).await.unwrap();

        assert_eq!(card(&after, "c1").column_id, ColumnId::from("progress"));
        assert_eq!(card_ids(&after, "new"), vec!["c0"]);
        assert_eq!(card_ids(&after, "progress"), vec!["c9", "c1"]);
        assert_eq!(rec.service.calls(), vec!["move_case c1 progress 1"]);
    }

    #[tokio::test]
    async fn optimistic_state_is_published_before_remote_call() {
        let board = four_columns(vec![order("c1", "new")]);
        let rec = reconciler(MockService::new(&board).failing(&["move_case"])).await;

        let err = rec.dispatch(move_to("c1", "review")).await.unwrap_err();
        assert!(err.was_reverted());

        let seen = rec.service.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(card_ids(&seen[0], "review"), vec!["c1"]);
        assert_eq!(card_ids(&rec.board().unwrap(), "new"), vec!["c1"]);
    }

    #[tokio::test]
    async fn rejected_intent_changes_nothing_and_calls_nothing() {
        let board = four_columns(vec![quote("q1", "new", Some("Q1"))]);
        let rec = reconciler(MockService::new(&board)).await;
        let before = rec.board().unwrap();

        let err = rec.dispatch(move_to("q1", "progress")).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Rejected(Rejection::InvalidTransition { .. })
        ));
        assert!(rec.service.calls().is_empty());
        assert_eq!(*rec.board().unwrap(), *before);
    }

    #[tokio::test]
    async fn failed_sync_restores_pre_transition_snapshot() {
        let mut source = order("c3", "new");
        source.escalated_to_id = Some("c4".into());
        let mut board = with_queues(vec![
            source,
            order("c1", "new"),
            order("c5", "new"),
            quote("q1", "new", Some("Q7")),
            quote("q2", "new", None),
        ]);
        board.columns[4].cards.push(order("c4", "esc"));
        board.renumber();

        let intents = vec![
            move_to("c1", "done"),
            Intent::Escalate { card: "c5".into() },
            Intent::Deescalate { card: "c3".into() },
            Intent::Win { card: "q1".into() },
            Intent::Lose { card: "q2".into() },
            Intent::Edit {
                card: "c1".into(),
                patch: CardPatch {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            },
            Intent::AddColumn {
                name: "Shipped".into(),
                is_final: true,
            },
            Intent::UpdateColumn {
                column: "review".into(),
                name: Some("QA".into()),
                color: None,
            },
            Intent::DeleteColumn {
                column: "review".into(),
            },
            Intent::ReorderColumn {
                column: "review".into(),
                direction: Direction::Right,
            },
        ];

        for intent in intents {
            let service = MockService::new(&board).failing(&[
                "move_case",
                "update_case",
                "escalate_case",
                "deescalate_case",
                "update_column",
                "delete_column",
                "create_column",
            ]);
            let rec = reconciler(service).await;
            let before = rec.board().unwrap();
            let name = intent.name();

            let err = rec.dispatch(intent).await.unwrap_err();
            assert!(
                matches!(err, WorkflowError::SyncFailure { .. }),
                "{name}: expected SyncFailure, got {err:?}"
            );
            assert_eq!(*rec.board().unwrap(), *before, "{name} was not rolled back");
            assert!(!rec.needs_reload());
        }
    }

    #[tokio::test]
    async fn win_quote_on_four_column_board() {
        let board = four_columns(vec![quote("c2", "new", Some("Q100"))]);
        let rec = reconciler(MockService::new(&board)).await;

        let after = rec.dispatch(Intent::Win { card: "c2".into() }).await.unwrap();

        let won = card(&after, "c2");
        assert!(matches!(won.kind, CardKind::Order(_)));
        assert_eq!(won.column_id, ColumnId::from("progress"));
        assert!(won.title.contains("(Ref: Q100)"));
        assert_eq!(rec.service.calls(), vec!["update_case c2"]);
    }

    #[tokio::test]
    async fn escalate_then_deescalate_keeps_forward_link() {
        let board = with_queues(vec![order("c3", "new")]);
        let rec = reconciler(MockService::new(&board)).await;

        let after = rec
            .dispatch(Intent::Escalate { card: "c3".into() })
            .await
            .unwrap();
        assert_eq!(card(&after, "c3").escalated_to_id, Some(CardId::from("c4")));
        assert_eq!(card_ids(&after, "esc"), vec!["c4"]);
        assert_eq!(card_ids(&after, "new"), vec!["c3"]);

        let after = rec
            .dispatch(Intent::Deescalate { card: "c4".into() })
            .await
            .unwrap();
        assert_eq!(card_ids(&after, "deesc"), vec!["c4"]);
        assert!(card_ids(&after, "esc").is_empty());
        assert_eq!(card(&after, "c3").escalated_to_id, Some(CardId::from("c4")));

        let err = rec
            .dispatch(Intent::Escalate { card: "c3".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Rejected(Rejection::AlreadyEscalated { .. })
        ));
        assert_eq!(
            rec.service.calls(),
            vec!["escalate_case c3", "deescalate_case c4"]
        );
    }

    #[tokio::test]
    async fn reorder_keeps_positions_a_permutation() {
        let board = with_queues(vec![]);
        let rec = reconciler(MockService::new(&board)).await;

        for (column, direction) in [
            ("done", Direction::Left),
            ("new", Direction::Right),
            ("deesc", Direction::Left),
            ("progress", Direction::Right),
        ] {
            let after = rec
                .dispatch(Intent::ReorderColumn {
                    column: column.into(),
                    direction,
                })
                .await
                .unwrap();
            let mut positions: Vec<u32> = after.columns.iter().map(|c| c.position).collect();
            positions.sort_unstable();
            assert_eq!(positions, (0..after.columns.len() as u32).collect::<Vec<_>>());
            assert!(after.positions_are_contiguous());
        }
        assert_eq!(rec.service.calls().len(), 8);
    }

    #[tokio::test]
    async fn reorder_with_one_failed_call_is_partial() {
        let board = four_columns(vec![]);
        let rec = reconciler(MockService::new(&board).failing(&["update_column review"])).await;
        let before = rec.board().unwrap();

        let err = rec
            .dispatch(Intent::ReorderColumn {
                column: "progress".into(),
                direction: Direction::Right,
            })
            .await
            .unwrap_err();

        match err {
            WorkflowError::PartialReorderFailure {
                changed, failed, ..
            } => {
                assert_eq!(changed, vec![ColumnId::from("progress")]);
                assert_eq!(failed, Some(ColumnId::from("review")));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert_eq!(*rec.board().unwrap(), *before);
        assert!(rec.needs_reload());

        rec.reload().await.unwrap();
        assert!(!rec.needs_reload());
    }

    #[tokio::test]
    async fn reorder_with_both_calls_failed_is_plain_sync_failure() {
        let board = four_columns(vec![]);
        let rec = reconciler(MockService::new(&board).failing(&["update_column"])).await;
        let before = rec.board().unwrap();

        let err = rec
            .dispatch(Intent::ReorderColumn {
                column: "progress".into(),
                direction: Direction::Left,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::SyncFailure { .. }));
        assert_eq!(*rec.board().unwrap(), *before);
        assert!(!rec.needs_reload());
        assert_eq!(rec.service.calls().len(), 2);
    }

    #[tokio::test]
    async fn delete_column_shifts_later_columns() {
        let board = four_columns(vec![]);
        let rec = reconciler(MockService::new(&board)).await;

        let after = rec
            .dispatch(Intent::DeleteColumn {
                column: "progress".into(),
            })
            .await
            .unwrap();
        assert_eq!(after.columns.len(), 3);
        assert!(after.positions_are_contiguous());
        assert_eq!(
            rec.service.calls(),
            vec![
                "delete_column progress",
                "update_column review",
                "update_column done"
            ]
        );
    }

    #[tokio::test]
    async fn delete_column_with_failed_shift_needs_reload() {
        let board = four_columns(vec![]);
        let rec = reconciler(MockService::new(&board).failing(&["update_column done"])).await;
        let before = rec.board().unwrap();

        let err = rec
            .dispatch(Intent::DeleteColumn {
                column: "progress".into(),
            })
            .await
            .unwrap_err();
        match err {
            WorkflowError::PartialReorderFailure {
                changed, failed, ..
            } => {
                assert_eq!(changed, vec![ColumnId::from("progress"), "review".into()]);
                assert_eq!(failed, Some(ColumnId::from("done")));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert_eq!(*rec.board().unwrap(), *before);
        assert!(rec.needs_reload());
    }

    #[tokio::test]
    async fn add_column_adopts_server_id() {
        let board = four_columns(vec![]);
        let rec = reconciler(MockService::new(&board)).await;

        let after = rec
            .dispatch(Intent::AddColumn {
                name: "Shipped".into(),
                is_final: true,
            })
            .await
            .unwrap();
        let added = after.column_at(4).unwrap();
        assert_eq!(added.id, ColumnId::from("col-server"));
        assert_eq!(added.name, "Shipped");
        assert!(added.is_final);
        assert_eq!(rec.service.calls(), vec!["create_column Shipped"]);
    }

    #[tokio::test]
    async fn dispatch_before_load_fails() {
        let rec = Reconciler::new(
            MockService::new(&four_columns(vec![])),
            RoleNames::default(),
        );
        let err = rec.dispatch(move_to("c1", "new")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Store(StoreError::NotLoaded)));
    }

    #[tokio::test]
    async fn load_failure_is_reported_as_fetch_error() {
        let service = MockService::new(&four_columns(vec![])).failing(&["fetch_board"]);
        let rec = Reconciler::new(service, RoleNames::default());
        let err = rec.load(&"b1".into()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Fetch(_)));
        assert!(rec.board().is_none());
    }

    #[tokio::test]
    async fn load_round_trips_the_service_record() {
        let mut board = with_queues(vec![order("c1", "new"), quote("q", "new", Some("Q9"))]);
        board.columns[0].cards[0].escalated_to_id = Some("m".into());
        board.columns[4].cards.push(order("m", "esc"));
        board.renumber();

        let rec = reconciler(MockService::new(&board)).await;
        assert_eq!(*rec.board().unwrap(), board);
    }
}
