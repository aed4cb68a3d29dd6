//! The orchestration engine: one client over the remote service, dispatching
//! unicast, multipath, group, and anycast request shapes.

mod anycast;
mod create;
mod fanout;
mod group;
mod query;

use fanout::MemberAction;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::MultipathError;
use crate::gri::{GroupId, ReservationId, natural_cmp};
use crate::model::{
    AddOutcome, CreateOutcome, Destination, FanoutReport, GroupRecord, MemberSnapshot,
    ModifyFields, QuerySnapshot, ReservationSpec, Status, SubOutcome,
};
use crate::registry::GroupRegistry;
use crate::request;
use crate::service::{CircuitService, ListEntry};

#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Interval between status polls while waiting for a terminal state.
    pub poll_interval: Duration,
    /// Deadline wrapping each whole orchestration call (N creates × poll
    /// loops). Expiry aborts further creates but never undoes prior ones.
    pub operation_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            poll_interval: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(600),
        }
    }
}

impl ClientConfig {
    fn validate(&self) -> Result<(), &'static str> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be non-zero");
        }
        if self.poll_interval >= self.operation_timeout {
            return Err("poll_interval must be smaller than operation_timeout");
            // Otherwise no poll could ever complete inside the deadline
        }
        Ok(())
    }
}

/// Client-side multipath orchestration over a one-circuit-per-request
/// service.
///
/// Owns the service connection, the group registry, and the single-slot
/// query scratch. Operations run sequentially within one call; one client
/// should not be shared across concurrent callers without external
/// serialization (the scratch slot is last-writer-wins).
pub struct MultipathClient<S: CircuitService> {
    pub(crate) service: S,
    pub(crate) registry: GroupRegistry,
    pub(crate) config: ClientConfig,
    scratch: Mutex<Option<QuerySnapshot>>,
}

impl<S: CircuitService> MultipathClient<S> {
    pub fn new(
        service: S,
        data_dir: impl Into<PathBuf>,
        config: ClientConfig,
    ) -> Result<Self, MultipathError> {
        config.validate().map_err(MultipathError::InvalidRequest)?;
        let dir = data_dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| MultipathError::Registry(format!("creating data dir: {e}")))?;
        Ok(Self {
            service,
            registry: GroupRegistry::new(dir),
            config,
            scratch: Mutex::new(None),
        })
    }

    /// The snapshot left behind by the most recent query or multipath
    /// create, for reuse by the next operation in the same call chain.
    pub fn last_query(&self) -> Option<QuerySnapshot> {
        self.scratch.lock().unwrap().clone()
    }

    pub(crate) fn store_snapshot(&self, snapshot: QuerySnapshot) {
        *self.scratch.lock().unwrap() = Some(snapshot);
    }

    pub(crate) fn store_create_snapshot(&self, outcome: &CreateOutcome, snapshots: Vec<MemberSnapshot>) {
        match outcome {
            CreateOutcome::Group { id, .. } => {
                self.store_snapshot(QuerySnapshot::Group { id: *id, members: snapshots });
            }
            CreateOutcome::Unicast(_) => {
                if let Some(snapshot) = snapshots.into_iter().next() {
                    self.store_snapshot(QuerySnapshot::Unicast(snapshot));
                }
            }
            CreateOutcome::Empty => {}
        }
    }

    async fn deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, MultipathError>>,
    ) -> Result<T, MultipathError> {
        match tokio::time::timeout(self.config.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.config.operation_timeout, "operation deadline exceeded");
                Err(MultipathError::DeadlineExceeded)
            }
        }
    }

    // ── Entry points ─────────────────────────────────────────

    /// Create a reservation, dispatched by request shape: an anycast
    /// candidate set goes through trial selection, `num_paths > 1` builds a
    /// disjoint group, `num_paths == 1` is a plain unicast create.
    pub async fn create(&self, spec: &ReservationSpec) -> Result<CreateOutcome, MultipathError> {
        request::validate(spec)?;
        self.deadline(async {
            match &spec.destination {
                Destination::Candidates(candidates) if candidates.len() > 1 => {
                    self.select_anycast(spec, candidates).await
                }
                Destination::Candidates(candidates) => {
                    self.create_single_destination(spec, &candidates[0]).await
                }
                Destination::Single(destination) => {
                    self.create_single_destination(spec, destination).await
                }
            }
        })
        .await
    }

    pub(crate) async fn create_single_destination(
        &self,
        spec: &ReservationSpec,
        destination: &str,
    ) -> Result<CreateOutcome, MultipathError> {
        if spec.num_paths <= 1 {
            self.create_unicast(spec, destination).await
        } else {
            let (outcome, snapshots) = self.create_multipath_inner(spec, destination).await?;
            self.store_create_snapshot(&outcome, snapshots);
            Ok(outcome)
        }
    }

    /// Query one id, expanding groups to their members (one level).
    pub async fn query(&self, id: &ReservationId) -> Result<QuerySnapshot, MultipathError> {
        self.deadline(self.query_inner(id)).await
    }

    /// Grow a group (or group an ungrouped unicast) by cloning link-disjoint
    /// counterparts of its newest member.
    pub async fn add_paths(
        &self,
        target: &ReservationId,
        count: u32,
    ) -> Result<AddOutcome, MultipathError> {
        if count < 1 {
            return Err(MultipathError::InvalidRequest("at least one path must be added"));
        }
        self.deadline(self.add_paths_inner(target, count)).await
    }

    /// Remove members from a group. Pure bookkeeping: the underlying
    /// reservations are never cancelled here.
    pub async fn remove_members(
        &self,
        group: GroupId,
        members: &[ReservationId],
    ) -> Result<SubOutcome, MultipathError> {
        self.remove_members_inner(group, members).await
    }

    pub async fn cancel(&self, id: &ReservationId) -> Result<FanoutReport, MultipathError> {
        self.deadline(self.fanout_inner(id, MemberAction::Cancel)).await
    }

    pub async fn modify(
        &self,
        id: &ReservationId,
        fields: &ModifyFields,
    ) -> Result<FanoutReport, MultipathError> {
        self.deadline(self.fanout_inner(id, MemberAction::Modify(fields))).await
    }

    /// Signal path setup. Only meaningful for RESERVED signal-xml circuits.
    pub async fn setup_path(&self, id: &ReservationId) -> Result<FanoutReport, MultipathError> {
        self.deadline(self.fanout_inner(id, MemberAction::SetupPath)).await
    }

    /// Tear down the live path of ACTIVE signal-xml circuits.
    pub async fn teardown_path(&self, id: &ReservationId) -> Result<FanoutReport, MultipathError> {
        self.deadline(self.fanout_inner(id, MemberAction::TeardownPath)).await
    }

    /// List unicast reservations matching the given statuses, in natural
    /// display order.
    pub async fn list_by_status(
        &self,
        statuses: &[Status],
    ) -> Result<Vec<ListEntry>, MultipathError> {
        self.deadline(async {
            let mut entries = self
                .service
                .list(statuses)
                .await
                .map_err(MultipathError::from)?;
            entries.sort_by(|a, b| natural_cmp(&a.id, &b.id));
            Ok(entries)
        })
        .await
    }

    /// All registered groups, in natural display order.
    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, MultipathError> {
        self.registry.list().await
    }

    /// Query the membership of each requested group. A nonexistent group is
    /// reported in-band as a single BAD_GRI placeholder member rather than
    /// failing the batch.
    pub async fn list_group_members(
        &self,
        ids: &[GroupId],
    ) -> Result<Vec<QuerySnapshot>, MultipathError> {
        self.deadline(async {
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                match self.query_inner(&ReservationId::Group(*id)).await {
                    Ok(snapshot) => out.push(snapshot),
                    Err(MultipathError::UnknownGroup(g)) => {
                        out.push(QuerySnapshot::Group {
                            id: g,
                            members: vec![MemberSnapshot {
                                id: ReservationId::Group(g),
                                status: Status::BadGri,
                                details: None,
                                faults: vec!["group does not exist".to_string()],
                            }],
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(out)
        })
        .await
    }
}
