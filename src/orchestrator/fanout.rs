//! Group fan-out: apply a single-member remote operation across a group.
//!
//! The member list comes from a fresh query, so invalid ids are known up
//! front and skipped. Multi-member operations are explicitly not atomic —
//! one member faulting never unwinds its siblings.

use crate::error::MultipathError;
use crate::gri::{ReservationId, UnicastId};
use crate::model::{FanoutReport, MemberOp, ModifyFields, Status};
use crate::observability;
use crate::service::{CircuitService, ModifyRequest, ServiceError};

use super::MultipathClient;

/// The per-member remote operation being fanned out.
#[derive(Debug, Clone, Copy)]
pub(super) enum MemberAction<'a> {
    Cancel,
    Modify(&'a ModifyFields),
    SetupPath,
    TeardownPath,
}

impl MemberAction<'_> {
    fn name(&self) -> &'static str {
        match self {
            MemberAction::Cancel => "cancel",
            MemberAction::Modify(_) => "modify",
            MemberAction::SetupPath => "setup_path",
            MemberAction::TeardownPath => "teardown_path",
        }
    }
}

impl<S: CircuitService> MultipathClient<S> {
    pub(super) async fn fanout_inner(
        &self,
        id: &ReservationId,
        action: MemberAction<'_>,
    ) -> Result<FanoutReport, MultipathError> {
        match id {
            ReservationId::Unicast(unicast) => {
                let result = match self.apply_member(unicast, &action).await {
                    Ok(status) => {
                        tracing::info!(op = action.name(), id = %unicast, %status, "operation complete");
                        Ok(status)
                    }
                    Err(ServiceError::Fault(message)) => {
                        tracing::error!(op = action.name(), id = %unicast, %message, "operation faulted");
                        Err(MultipathError::Fault {
                            id: Some(unicast.0.clone()),
                            message,
                        })
                    }
                    Err(ServiceError::Unavailable(message)) => {
                        return Err(MultipathError::Unavailable(message));
                    }
                };
                Ok(FanoutReport {
                    group: None,
                    results: vec![MemberOp {
                        id: unicast.clone(),
                        outcome: result,
                    }],
                })
            }
            ReservationId::Group(group) => {
                // Query first: the snapshot is the authoritative member list
                // and marks unresolvable ids BAD_GRI.
                let snapshot = self.query_inner(id).await?;
                let total = snapshot.members().len();
                let mut results = Vec::new();

                for (i, member) in snapshot.members().iter().enumerate() {
                    let ReservationId::Unicast(unicast) = &member.id else {
                        tracing::debug!(id = %member.id, "skipping opaque nested group member");
                        continue;
                    };
                    if member.status == Status::BadGri {
                        tracing::warn!(
                            op = action.name(),
                            id = %unicast,
                            "skipping member with unresolvable id"
                        );
                        continue;
                    }

                    tracing::info!(op = action.name(), id = %unicast, member = i + 1, of = total, "applying to member");
                    match self.apply_member(unicast, &action).await {
                        Ok(status) => results.push(MemberOp {
                            id: unicast.clone(),
                            outcome: Ok(status),
                        }),
                        Err(ServiceError::Fault(message)) => {
                            metrics::counter!(observability::FANOUT_MEMBER_FAILURES_TOTAL)
                                .increment(1);
                            tracing::error!(
                                op = action.name(),
                                id = %unicast,
                                %message,
                                "member operation faulted, continuing"
                            );
                            results.push(MemberOp {
                                id: unicast.clone(),
                                outcome: Err(MultipathError::Fault {
                                    id: Some(unicast.0.clone()),
                                    message,
                                }),
                            });
                        }
                        Err(ServiceError::Unavailable(message)) => {
                            return Err(MultipathError::Unavailable(message));
                        }
                    }
                }

                tracing::info!(op = action.name(), group = %group, applied = results.len(), "group operation complete");
                Ok(FanoutReport {
                    group: Some(*group),
                    results,
                })
            }
        }
    }

    async fn apply_member(
        &self,
        id: &UnicastId,
        action: &MemberAction<'_>,
    ) -> Result<Status, ServiceError> {
        let reply = match action {
            MemberAction::Cancel => self.service.cancel(id.as_str()).await?,
            MemberAction::Modify(fields) => {
                self.service
                    .modify(&ModifyRequest {
                        id: id.0.clone(),
                        description: fields.description.clone(),
                        bandwidth: fields.bandwidth,
                        starts_at: fields.starts_at,
                        ends_at: fields.ends_at,
                    })
                    .await?
            }
            MemberAction::SetupPath => self.service.create_path(id.as_str()).await?,
            MemberAction::TeardownPath => self.service.teardown_path(id.as_str()).await?,
        };
        Ok(reply.status)
    }
}
