//! Query/status aggregation: one id in, a flat snapshot out.

use crate::error::MultipathError;
use crate::gri::{ReservationId, UnicastId};
use crate::model::{MemberSnapshot, QuerySnapshot, Status};
use crate::service::{CircuitService, ServiceError};

use super::MultipathClient;

impl<S: CircuitService> MultipathClient<S> {
    /// Expand a group id to one remote query per member (one level only —
    /// nested group members stay opaque), or query a unicast id directly.
    /// The snapshot lands in the scratch slot for the next operation in the
    /// same call chain.
    pub(super) async fn query_inner(
        &self,
        id: &ReservationId,
    ) -> Result<QuerySnapshot, MultipathError> {
        let snapshot = match id {
            ReservationId::Unicast(unicast) => {
                QuerySnapshot::Unicast(self.query_unicast_member(unicast).await?)
            }
            ReservationId::Group(group) => {
                let record = self
                    .registry
                    .get(*group)
                    .await?
                    .ok_or(MultipathError::UnknownGroup(*group))?;
                let mut members = Vec::with_capacity(record.members.len());
                for member in &record.members {
                    match member {
                        ReservationId::Unicast(unicast) => {
                            members.push(self.query_unicast_member(unicast).await?);
                        }
                        ReservationId::Group(_) => {
                            members.push(MemberSnapshot {
                                id: member.clone(),
                                status: Status::Unknown,
                                details: None,
                                faults: Vec::new(),
                            });
                        }
                    }
                }
                QuerySnapshot::Group {
                    id: *group,
                    members,
                }
            }
        };
        self.store_snapshot(snapshot.clone());
        Ok(snapshot)
    }

    /// Query one unicast id. A service fault becomes a synthetic BAD_GRI
    /// placeholder so a batch can keep going; a transport failure aborts
    /// the whole call.
    pub(super) async fn query_unicast_member(
        &self,
        id: &UnicastId,
    ) -> Result<MemberSnapshot, MultipathError> {
        match self.service.query(id.as_str()).await {
            Ok(reply) => Ok(MemberSnapshot {
                id: ReservationId::Unicast(id.clone()),
                status: reply.details.status,
                details: Some(reply.details),
                faults: reply.faults,
            }),
            Err(ServiceError::Fault(message)) => {
                tracing::warn!(id = %id, %message, "member query faulted");
                Ok(MemberSnapshot {
                    id: ReservationId::Unicast(id.clone()),
                    status: Status::BadGri,
                    details: None,
                    faults: vec![message],
                })
            }
            Err(ServiceError::Unavailable(message)) => {
                Err(MultipathError::Unavailable(message))
            }
        }
    }
}
