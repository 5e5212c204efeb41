//! Turns an applied delta into the remote calls that persist it.

use crate::engine::Delta;
use crate::model::{Board, BoardId, CardId, CardPatch, ColumnId};

use super::error::SyncError;
use super::types::{
    CasePatch, CaseRecord, ColumnPatch, ColumnRecord, CreateColumnRequest, MoveCaseRequest,
};
use super::BoardService;

/// One request to the persistence service.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    MoveCase { case: CardId, body: MoveCaseRequest },
    UpdateCase { case: CardId, patch: CasePatch },
    EscalateCase { case: CardId },
    DeescalateCase { case: CardId },
    UpdateColumn { column: ColumnId, patch: ColumnPatch },
    CreateColumn { body: CreateColumnRequest },
    DeleteColumn { column: ColumnId },
}

/// What the service sent back for a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAck {
    Empty,
    Case(CaseRecord),
    Column(ColumnRecord),
}

/// How the calls for one delta are issued.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPlan {
    Single(RemoteCall),
    /// Two independent calls sent together. The service gives no atomic
    /// guarantee across them.
    Paired(RemoteCall, RemoteCall),
    /// Calls sent one after another, stopping at the first failure.
    Sequence(Vec<RemoteCall>),
}

impl RemoteCall {
    /// The column whose remote state this call changes, if any.
    pub fn column(&self) -> Option<&ColumnId> {
        match self {
            RemoteCall::UpdateColumn { column, .. } | RemoteCall::DeleteColumn { column } => {
                Some(column)
            }
            _ => None,
        }
    }

    pub async fn execute(
        &self,
        service: &impl BoardService,
        board: &BoardId,
    ) -> Result<RemoteAck, SyncError> {
        match self {
            RemoteCall::MoveCase { case, body } => {
                service.move_case(case, body).await?;
                Ok(RemoteAck::Empty)
            }
            RemoteCall::UpdateCase { case, patch } => {
                service.update_case(case, patch).await.map(RemoteAck::Case)
            }
            RemoteCall::EscalateCase { case } => {
                service.escalate_case(case).await.map(RemoteAck::Case)
            }
            RemoteCall::DeescalateCase { case } => {
                service.deescalate_case(case).await?;
                Ok(RemoteAck::Empty)
            }
            RemoteCall::UpdateColumn { column, patch } => service
                .update_column(board, column, patch)
                .await
                .map(RemoteAck::Column),
            RemoteCall::CreateColumn { body } => service
                .create_column(board, body)
                .await
                .map(RemoteAck::Column),
            RemoteCall::DeleteColumn { column } => {
                service.delete_column(board, column).await?;
                Ok(RemoteAck::Empty)
            }
        }
    }
}

impl SyncPlan {
    /// Plans the remote calls for `delta`, reading final positions from
    /// `applied`, the snapshot the delta produced.
    pub fn for_delta(delta: &Delta, applied: &Board) -> SyncPlan {
        let position_of = |id: &CardId| applied.card(id).map(|c| c.position).unwrap_or_default();
        let column_position = |id: &ColumnId| {
            applied
                .column(id)
                .map(|c| c.position)
                .unwrap_or_default()
        };

        match delta {
            Delta::Move { card, to, .. } => SyncPlan::Single(RemoteCall::MoveCase {
                case: card.clone(),
                body: MoveCaseRequest {
                    column_id: to.to_string(),
                    position: position_of(card),
                },
            }),
            Delta::Edit { card, patch } => SyncPlan::Single(RemoteCall::UpdateCase {
                case: card.id.clone(),
                patch: edit_patch(patch),
            }),
            Delta::Escalate { source, .. } => SyncPlan::Single(RemoteCall::EscalateCase {
                case: source.clone(),
            }),
            Delta::Deescalate { mirror, .. } => SyncPlan::Single(RemoteCall::DeescalateCase {
                case: mirror.clone(),
            }),
            Delta::Win { card, .. } => SyncPlan::Single(RemoteCall::UpdateCase {
                case: card.id.clone(),
                patch: CasePatch {
                    title: Some(card.title.clone()),
                    case_type: Some(card.kind.as_str().to_string()),
                    column_id: Some(card.column_id.to_string()),
                    position: Some(position_of(&card.id)),
                    converted_from_quote: Some(true),
                    ..Default::default()
                },
            }),
            Delta::Lose { card, archived_at } => SyncPlan::Single(RemoteCall::UpdateCase {
                case: card.clone(),
                patch: CasePatch {
                    archived_at: Some(*archived_at),
                    ..Default::default()
                },
            }),
            Delta::SwapColumns { column, neighbor } => SyncPlan::Paired(
                position_update(column, column_position(column)),
                position_update(neighbor, column_position(neighbor)),
            ),
            Delta::AddColumn { column } => SyncPlan::Single(RemoteCall::CreateColumn {
                body: CreateColumnRequest {
                    name: column.name.clone(),
                    position: column_position(&column.id),
                    is_final: column.is_final,
                },
            }),
            Delta::UpdateColumn {
                column,
                name,
                color,
            } => SyncPlan::Single(RemoteCall::UpdateColumn {
                column: column.clone(),
                patch: ColumnPatch {
                    position: None,
                    name: name.clone(),
                    color: color.clone(),
                },
            }),
            Delta::RemoveColumn { column, position } => {
                let mut calls = vec![RemoteCall::DeleteColumn {
                    column: column.clone(),
                }];
                calls.extend(
                    applied
                        .columns
                        .iter()
                        .skip(*position as usize)
                        .map(|shifted| position_update(&shifted.id, shifted.position)),
                );
                SyncPlan::Sequence(calls)
            }
        }
    }

    pub fn calls(&self) -> Vec<&RemoteCall> {
        match self {
            SyncPlan::Single(call) => vec![call],
            SyncPlan::Paired(a, b) => vec![a, b],
            SyncPlan::Sequence(calls) => calls.iter().collect(),
        }
    }
}

fn position_update(column: &ColumnId, position: u32) -> RemoteCall {
    RemoteCall::UpdateColumn {
        column: column.clone(),
        patch: ColumnPatch {
            position: Some(position),
            ..Default::default()
        },
    }
}

fn edit_patch(patch: &CardPatch) -> CasePatch {
    CasePatch {
        title: patch.title.clone(),
        priority: patch.priority.map(|p| p.as_str().to_string()),
        assignee: patch.assignee.clone(),
        due_date: patch.due_date,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DecisionContext, Direction, Intent, TransitionEngine};
    use crate::fixtures::{four_columns, order, quote};
    use crate::model::Priority;
    use crate::store::apply_delta;

    fn plan(board: &Board, intent: Intent) -> SyncPlan {
        let delta = TransitionEngine::decide(&intent, &DecisionContext::new(board))
            .into_result()
            .unwrap();
        let applied = apply_delta(board, &delta).unwrap();
        SyncPlan::for_delta(&delta, &applied)
    }

    #[test]
    fn move_sends_resolved_append_position() {
        let mut board = four_columns(vec![order("c1", "new")]);
        board.columns[1].cards.push(order("c9", "progress"));
        board.renumber();

        let plan = plan(
            &board,
            Intent::Move {
                card: "c1".into(),
                column: "progress".into(),
                position: None,
            },
        );
        assert_eq!(
            plan,
            SyncPlan::Single(RemoteCall::MoveCase {
                case: "c1".into(),
                body: MoveCaseRequest {
                    column_id: "progress".into(),
                    position: 1,
                },
            })
        );
    }

    #[test]
    fn win_updates_type_column_and_title() {
        let board = four_columns(vec![quote("c2", "new", Some("Q100"))]);
        let SyncPlan::Single(RemoteCall::UpdateCase { case, patch }) =
            plan(&board, Intent::Win { card: "c2".into() })
        else {
            panic!("expected a single update");
        };
        assert_eq!(case, CardId::from("c2"));
        assert_eq!(patch.case_type.as_deref(), Some("order"));
        assert_eq!(patch.column_id.as_deref(), Some("progress"));
        assert_eq!(patch.position, Some(0));
        assert_eq!(patch.title.as_deref(), Some("Quote c2 (Ref: Q100)"));
    }

    #[test]
    fn reorder_plans_two_position_updates() {
        let board = four_columns(vec![]);
        let plan = plan(
            &board,
            Intent::ReorderColumn {
                column: "progress".into(),
                direction: Direction::Right,
            },
        );
        assert_eq!(
            plan,
            SyncPlan::Paired(
                position_update(&"progress".into(), 2),
                position_update(&"review".into(), 1),
            )
        );
    }

    #[test]
    fn delete_plans_delete_then_shifts() {
        let board = four_columns(vec![]);
        let plan = plan(&board, Intent::DeleteColumn { column: "progress".into() });
        let columns: Vec<_> = plan.calls().iter().filter_map(|c| c.column()).cloned().collect();
        assert_eq!(
            columns,
            vec![ColumnId::from("progress"), "review".into(), "done".into()]
        );
        assert!(matches!(plan.calls()[0], RemoteCall::DeleteColumn { .. }));
    }

    #[test]
    fn edit_maps_priority_label() {
        let board = four_columns(vec![order("c1", "new")]);
        let plan = plan(
            &board,
            Intent::Edit {
                card: "c1".into(),
                patch: CardPatch {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            },
        );
        let SyncPlan::Single(RemoteCall::UpdateCase { patch, .. }) = plan else {
            panic!("expected update");
        };
        assert_eq!(patch.priority.as_deref(), Some("high"));
        assert!(patch.title.is_none());
    }
}
