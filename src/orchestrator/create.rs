//! The disjoint-path creation loop.
//!
//! Path i's request carries the reserved paths of requests 1..i-1 as
//! avoidance constraints — a true data dependency, so the loop is strictly
//! sequential. Fewer members than requested is a valid outcome.

use crate::error::MultipathError;
use crate::gri::{ReservationId, UnicastId};
use crate::model::{CreateOutcome, GroupRecord, MemberSnapshot, ReservationSpec};
use crate::observability;
use crate::request;
use crate::service::CircuitService;

use super::MultipathClient;

impl<S: CircuitService> MultipathClient<S> {
    /// Unicast fast path: submit the one create and return. Callers poll
    /// via `query` when they care about the terminal state.
    pub(super) async fn create_unicast(
        &self,
        spec: &ReservationSpec,
        destination: &str,
    ) -> Result<CreateOutcome, MultipathError> {
        let request = request::build_create_request(spec, destination, &spec.avoid)?;
        let reply = self.service.create(&request).await?;
        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        tracing::info!(id = %reply.id, status = %reply.status, "created unicast reservation");
        Ok(CreateOutcome::Unicast(UnicastId(reply.id)))
    }

    /// Create up to `spec.num_paths` link-disjoint members against one
    /// destination, polling each to a terminal state before the next create.
    ///
    /// Returns the outcome plus the terminal member snapshots (the last one
    /// may be a pathless attempt that ended the loop). With `num_paths > 1`
    /// a group id is allocated up front — the counter advances even if
    /// nothing ends up reserved — and the surviving members are registered.
    /// `num_paths == 1` creates and polls a single circuit with no group
    /// bookkeeping (the anycast selector trials single paths this way).
    ///
    /// A service fault aborts the whole call. Members already created are
    /// not rolled back; partial groups legitimately exist.
    pub(super) async fn create_multipath_inner(
        &self,
        spec: &ReservationSpec,
        destination: &str,
    ) -> Result<(CreateOutcome, Vec<MemberSnapshot>), MultipathError> {
        if spec.num_paths <= 1 {
            let request = request::build_create_request(spec, destination, &spec.avoid)?;
            let reply = self.service.create(&request).await?;
            metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
            let member = UnicastId(reply.id);
            let snapshot = self.poll_terminal(&member).await?;
            return Ok((CreateOutcome::Unicast(member), vec![snapshot]));
        }

        let group_id = self.registry.allocate().await?;
        let mut avoidance = spec.avoid.clone();
        let mut members: Vec<UnicastId> = Vec::new();
        let mut snapshots: Vec<MemberSnapshot> = Vec::new();

        for attempt in 1..=spec.num_paths {
            let request = request::build_create_request(spec, destination, &avoidance)?;
            let reply = self.service.create(&request).await?;
            metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
            let member = UnicastId(reply.id);
            tracing::info!(
                group = %group_id,
                id = %member,
                attempt,
                requested = spec.num_paths,
                "created multipath member"
            );

            let snapshot = self.poll_terminal(&member).await?;
            match snapshot.details.as_ref().and_then(|d| d.path.clone()) {
                Some(path) => {
                    tracing::debug!(
                        id = %member,
                        hops = path.hop_count(),
                        terminus = path.terminal_hop().unwrap_or("?"),
                        "resolved disjoint path"
                    );
                    avoidance.push(path.encode());
                    members.push(member);
                    snapshots.push(snapshot);
                }
                None => {
                    // Best-effort: no further disjoint path exists. The
                    // pathless attempt is not counted as a member.
                    tracing::warn!(
                        group = %group_id,
                        reserved = members.len(),
                        requested = spec.num_paths,
                        "disjoint paths exhausted, stopping early"
                    );
                    snapshots.push(snapshot);
                    break;
                }
            }
        }

        if members.is_empty() {
            tracing::warn!(group = %group_id, "no disjoint path could be reserved");
            return Ok((CreateOutcome::Empty, snapshots));
        }

        let record = GroupRecord {
            id: group_id,
            members: members.iter().cloned().map(ReservationId::Unicast).collect(),
        };
        // Id 0 means the counter sequence just (re)started: reinitialize the
        // lookup table so stale entries cannot collide with the new ids.
        if group_id.0 == 0 {
            self.registry.reset_with(&record).await?;
        } else {
            self.registry.upsert(&record).await?;
        }
        tracing::info!(
            group = %group_id,
            members = members.len(),
            requested = spec.num_paths,
            "registered multipath group"
        );

        Ok((
            CreateOutcome::Group {
                id: group_id,
                members,
                requested: spec.num_paths,
            },
            snapshots,
        ))
    }

    /// Poll one reservation at the configured interval until it reaches a
    /// terminal state. The enclosing operation deadline bounds this loop.
    pub(super) async fn poll_terminal(
        &self,
        id: &UnicastId,
    ) -> Result<MemberSnapshot, MultipathError> {
        let started = std::time::Instant::now();
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            metrics::counter!(observability::STATUS_POLLS_TOTAL).increment(1);
            let snapshot = self.query_unicast_member(id).await?;
            if snapshot.status.is_terminal() {
                metrics::histogram!(observability::POLL_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                tracing::debug!(id = %id, status = %snapshot.status, "reached terminal state");
                return Ok(snapshot);
            }
            tracing::debug!(id = %id, status = %snapshot.status, "still polling");
        }
    }
}
