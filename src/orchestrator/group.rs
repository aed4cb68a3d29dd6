//! Group lifecycle: grow by cloning, shrink by bookkeeping.

use crate::error::MultipathError;
use crate::gri::{GroupId, ReservationId, UnicastId};
use crate::model::{
    AddOutcome, Destination, GroupRecord, MemberSnapshot, ReservationDetails, ReservationSpec,
    Status, SubOutcome,
};
use crate::observability;
use crate::request;
use crate::service::CircuitService;

use super::MultipathClient;

/// Rebuild the creation spec of an existing reservation from its queried
/// details, ready to be resubmitted for a disjoint clone.
fn spec_from_details(details: &ReservationDetails) -> ReservationSpec {
    ReservationSpec {
        description: details.description.clone(),
        source: details.source.clone(),
        source_tag: details.source_tag.clone(),
        destination: Destination::Single(details.destination.clone()),
        destination_tag: details.destination_tag.clone(),
        bandwidth: details.bandwidth,
        setup_mode: details.setup_mode,
        starts_at: details.starts_at,
        ends_at: details.ends_at,
        num_paths: 1,
        avoid: Vec::new(),
    }
}

impl<S: CircuitService> MultipathClient<S> {
    /// Add up to `count` disjoint members. For a group target the newest
    /// member is cloned — its avoidance constraints already cover every
    /// other member's path. An ungrouped unicast target becomes the first
    /// member of a fresh group on the first successful clone.
    pub(super) async fn add_paths_inner(
        &self,
        target: &ReservationId,
        count: u32,
    ) -> Result<AddOutcome, MultipathError> {
        let seed_id = match target {
            ReservationId::Group(group) => {
                let record = self
                    .registry
                    .get(*group)
                    .await?
                    .ok_or(MultipathError::UnknownGroup(*group))?;
                let newest = record
                    .members
                    .iter()
                    .rev()
                    .find_map(|m| m.as_unicast().cloned())
                    .ok_or_else(|| {
                        MultipathError::Registry(format!("group {group} has no unicast members"))
                    })?;
                tracing::info!(group = %group, seed = %newest, "cloning newest group member");
                newest
            }
            ReservationId::Unicast(unicast) => unicast.clone(),
        };

        let seed = self.query_unicast_member(&seed_id).await?;
        self.clone_disjoint(&seed_id, &seed, count).await
    }

    /// Cloning a circuit that is finished, failed or cancelled is
    /// meaningless, so anything but RESERVED/ACTIVE is rejected.
    async fn clone_disjoint(
        &self,
        original: &UnicastId,
        seed: &MemberSnapshot,
        count: u32,
    ) -> Result<AddOutcome, MultipathError> {
        if !matches!(seed.status, Status::Reserved | Status::Active) {
            return Err(MultipathError::NotCloneable {
                id: original.0.clone(),
                status: seed.status,
            });
        }
        let details = seed.details.as_ref().ok_or_else(|| MultipathError::Fault {
            id: Some(original.0.clone()),
            message: "query returned no details for clone seed".to_string(),
        })?;

        let spec = spec_from_details(details);
        // Seed avoidance: the member's own constraints plus its reserved path.
        let mut avoidance = details.prior_paths.clone();
        if let Some(path) = &details.path {
            avoidance.push(path.encode());
        }

        let mut group = self
            .registry
            .member_of(&ReservationId::Unicast(original.clone()))
            .await?;
        let mut added = 0u32;

        for attempt in 1..=count {
            let request = request::build_create_request(&spec, &details.destination, &avoidance)?;
            let reply = self.service.create(&request).await?;
            metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
            let member = UnicastId(reply.id);
            tracing::info!(id = %member, attempt, requested = count, "created disjoint clone");

            let snapshot = self.poll_terminal(&member).await?;
            let Some(path) = snapshot.details.as_ref().and_then(|d| d.path.clone()) else {
                tracing::warn!(
                    added,
                    requested = count,
                    "disjoint paths exhausted, stopping early"
                );
                break;
            };
            avoidance.push(path.encode());
            added += 1;

            match &mut group {
                Some(record) => {
                    record.members.push(ReservationId::Unicast(member.clone()));
                    self.registry.upsert(record).await?;
                    tracing::info!(group = %record.id, id = %member, "appended member to group");
                }
                None => {
                    let id = self.registry.allocate().await?;
                    let record = GroupRecord {
                        id,
                        members: vec![
                            ReservationId::Unicast(original.clone()),
                            ReservationId::Unicast(member.clone()),
                        ],
                    };
                    if id.0 == 0 {
                        self.registry.reset_with(&record).await?;
                    } else {
                        self.registry.upsert(&record).await?;
                    }
                    tracing::info!(
                        group = %id,
                        original = %original,
                        id = %member,
                        "combined into new group"
                    );
                    group = Some(record);
                }
            }
        }

        Ok(AddOutcome {
            group: group.map(|record| record.id),
            added,
        })
    }

    /// Drop the listed members from a group's record. Ids not present are
    /// silent no-ops; removing the last member deletes the group. The
    /// underlying reservations are untouched.
    pub(super) async fn remove_members_inner(
        &self,
        group: GroupId,
        members: &[ReservationId],
    ) -> Result<SubOutcome, MultipathError> {
        let record = self
            .registry
            .get(group)
            .await?
            .ok_or(MultipathError::UnknownGroup(group))?;

        let mut remaining = record.members.clone();
        remaining.retain(|m| !members.contains(m));
        let dropped = record.members.len() - remaining.len();

        if remaining.is_empty() {
            self.registry.remove(group).await?;
            tracing::info!(group = %group, "group is empty, deleting record");
            return Ok(SubOutcome::Empty);
        }

        let updated = GroupRecord {
            id: group,
            members: remaining,
        };
        self.registry.upsert(&updated).await?;
        tracing::info!(group = %group, dropped, members = updated.members.len(), "updated group");
        Ok(SubOutcome::Updated(updated))
    }
}
