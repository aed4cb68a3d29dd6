use serde::{Deserialize, Serialize};

use crate::error::MultipathError;
use crate::gri::{GroupId, ReservationId, UnicastId};

/// Unix epoch seconds — the only time type on the wire.
pub type Epoch = i64;

/// Minimum reservation duration accepted by validation.
pub const MIN_DURATION_SECS: Epoch = 60;

/// Remote reservation status vocabulary.
///
/// Terminal statuses end a polling loop; successful ones mark a usable
/// circuit. Everything else is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "INPATHCALCULATION")]
    InPathCalculation,
    #[serde(rename = "PATHCALCULATED")]
    PathCalculated,
    #[serde(rename = "INCOMMIT")]
    InCommit,
    #[serde(rename = "COMMITTED")]
    Committed,
    #[serde(rename = "RESERVED")]
    Reserved,
    #[serde(rename = "INSETUP")]
    InSetup,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INTEARDOWN")]
    InTeardown,
    #[serde(rename = "INMODIFY")]
    InModify,
    #[serde(rename = "INCANCEL")]
    InCancel,
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    /// Synthetic status for an id the service refused to resolve.
    #[serde(rename = "BAD_GRI")]
    BadGri,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Accepted => "ACCEPTED",
            Status::InPathCalculation => "INPATHCALCULATION",
            Status::PathCalculated => "PATHCALCULATED",
            Status::InCommit => "INCOMMIT",
            Status::Committed => "COMMITTED",
            Status::Reserved => "RESERVED",
            Status::InSetup => "INSETUP",
            Status::Active => "ACTIVE",
            Status::InTeardown => "INTEARDOWN",
            Status::InModify => "INMODIFY",
            Status::InCancel => "INCANCEL",
            Status::Finished => "FINISHED",
            Status::Cancelled => "CANCELLED",
            Status::Failed => "FAILED",
            Status::Ok => "OK",
            Status::Unknown => "UNKNOWN",
            Status::BadGri => "BAD_GRI",
        }
    }

    /// A polling loop stops when the reservation reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Reserved
                | Status::Active
                | Status::Finished
                | Status::Failed
                | Status::Cancelled
                | Status::Unknown
                | Status::BadGri
        )
    }

    /// Terminal and usable.
    pub fn is_successful(self) -> bool {
        matches!(self, Status::Reserved | Status::Active | Status::Finished)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VLAN tagging state of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagState {
    Tagged(String),
    Untagged,
}

impl TagState {
    pub fn is_tagged(&self) -> bool {
        matches!(self, TagState::Tagged(_))
    }

    /// VLAN value sent on the wire. Untagged endpoints send "any".
    pub fn wire_value(&self) -> &str {
        match self {
            TagState::Tagged(v) => v,
            TagState::Untagged => "any",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSetupMode {
    #[serde(rename = "timer-automatic")]
    TimerAutomatic,
    #[serde(rename = "signal-xml")]
    SignalXml,
}

/// Ordered hop sequence of a reserved (or requested) route.
///
/// Canonical text encoding: hop ids joined and terminated by `;`
/// ("h1;h2;h3;"). The final hop identifies the routed destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub hops: Vec<String>,
}

impl Path {
    pub fn new(hops: Vec<String>) -> Self {
        Self { hops }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for hop in &self.hops {
            out.push_str(hop);
            out.push(';');
        }
        out
    }

    pub fn decode(s: &str) -> Self {
        Self {
            hops: s.split(';').filter(|h| !h.is_empty()).map(String::from).collect(),
        }
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// The routed destination: the last hop on the path.
    pub fn terminal_hop(&self) -> Option<&str> {
        self.hops.last().map(String::as_str)
    }
}

/// Where a reservation is headed: one endpoint, or an anycast candidate set.
/// Endpoints arrive already split by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Single(String),
    Candidates(Vec<String>),
}

/// Normalized input to a create operation.
#[derive(Debug, Clone)]
pub struct ReservationSpec {
    pub description: String,
    pub source: String,
    pub source_tag: TagState,
    pub destination: Destination,
    pub destination_tag: TagState,
    /// Bandwidth in Mbps; must be positive.
    pub bandwidth: i64,
    pub setup_mode: PathSetupMode,
    pub starts_at: Epoch,
    pub ends_at: Epoch,
    /// Requested number of link-disjoint paths; 1 means plain unicast.
    pub num_paths: u32,
    /// Path encodings the computed route must stay disjoint from.
    pub avoid: Vec<String>,
}

/// Everything the remote service reports about one reservation.
///
/// Carries enough of the original request to reconstruct it: group add
/// clones a member from its queried details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDetails {
    pub id: String,
    pub status: Status,
    pub description: String,
    pub source: String,
    pub source_tag: TagState,
    pub destination: String,
    pub destination_tag: TagState,
    pub bandwidth: i64,
    pub setup_mode: PathSetupMode,
    pub starts_at: Epoch,
    pub ends_at: Epoch,
    /// The reserved path, or None while none is resolved.
    pub path: Option<Path>,
    /// Avoidance constraints the reservation was created with.
    pub prior_paths: Vec<String>,
}

/// Persisted group membership. K is always `members.len()`; the stored K
/// field is validated on parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: GroupId,
    /// Members in creation order. Nested group ids are permitted.
    pub members: Vec<ReservationId>,
}

impl GroupRecord {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

// ── Query result types ───────────────────────────────────────────

/// One member's slice of a query snapshot.
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub id: ReservationId,
    pub status: Status,
    /// None for failed member queries and opaque nested groups.
    pub details: Option<ReservationDetails>,
    pub faults: Vec<String>,
}

/// Result of one aggregator call. Overwritten in the scratch slot on every
/// query so the next operation in the same call chain can reuse it.
#[derive(Debug, Clone)]
pub enum QuerySnapshot {
    Unicast(MemberSnapshot),
    Group {
        id: GroupId,
        members: Vec<MemberSnapshot>,
    },
}

impl QuerySnapshot {
    pub fn members(&self) -> &[MemberSnapshot] {
        match self {
            QuerySnapshot::Unicast(m) => std::slice::from_ref(m),
            QuerySnapshot::Group { members, .. } => members,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            QuerySnapshot::Unicast(_) => None,
            QuerySnapshot::Group { id, .. } => Some(*id),
        }
    }
}

// ── Operation outcomes ───────────────────────────────────────────

/// Result of a create. Fewer members than requested is a valid outcome
/// (best-effort), as is `Empty` when nothing could be reserved at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Unicast(UnicastId),
    Group {
        id: GroupId,
        members: Vec<UnicastId>,
        requested: u32,
    },
    Empty,
}

impl CreateOutcome {
    pub fn id(&self) -> Option<ReservationId> {
        match self {
            CreateOutcome::Unicast(u) => Some(ReservationId::Unicast(u.clone())),
            CreateOutcome::Group { id, .. } => Some(ReservationId::Group(*id)),
            CreateOutcome::Empty => None,
        }
    }
}

/// Result of a group add. `group` is None only when an ungrouped target
/// gained no members (nothing was allocated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub group: Option<GroupId>,
    pub added: u32,
}

/// Result of a group subtract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubOutcome {
    Updated(GroupRecord),
    /// The last member was removed; the group record is gone.
    Empty,
}

/// Field changes for a modify. Only supplied fields are sent.
#[derive(Debug, Clone, Default)]
pub struct ModifyFields {
    pub description: Option<String>,
    pub bandwidth: Option<i64>,
    pub starts_at: Option<Epoch>,
    pub ends_at: Option<Epoch>,
}

/// Per-member result of a fanned-out group operation.
#[derive(Debug)]
pub struct MemberOp {
    pub id: UnicastId,
    pub outcome: Result<Status, MultipathError>,
}

/// Aggregate result of a group operation. Multi-member operations are not
/// atomic: some members may have succeeded and some failed.
#[derive(Debug)]
pub struct FanoutReport {
    pub group: Option<GroupId>,
    pub results: Vec<MemberOp>,
}

impl FanoutReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        for s in [
            Status::Reserved,
            Status::Active,
            Status::Finished,
            Status::Failed,
            Status::Cancelled,
            Status::Unknown,
            Status::BadGri,
        ] {
            assert!(s.is_terminal(), "{s} should be terminal");
        }
        for s in [
            Status::Accepted,
            Status::InPathCalculation,
            Status::PathCalculated,
            Status::InCommit,
            Status::Committed,
            Status::InSetup,
            Status::InModify,
            Status::InCancel,
            Status::InTeardown,
        ] {
            assert!(!s.is_terminal(), "{s} should be transient");
        }
    }

    #[test]
    fn successful_statuses() {
        assert!(Status::Reserved.is_successful());
        assert!(Status::Active.is_successful());
        assert!(Status::Finished.is_successful());
        assert!(!Status::Failed.is_successful());
        assert!(!Status::Cancelled.is_successful());
        assert!(!Status::BadGri.is_successful());
    }

    #[test]
    fn path_encoding_round_trip() {
        let path = Path::new(vec!["a:1".into(), "b:2".into(), "c:3".into()]);
        let encoded = path.encode();
        assert_eq!(encoded, "a:1;b:2;c:3;");
        assert_eq!(Path::decode(&encoded), path);
    }

    #[test]
    fn path_terminal_hop_is_destination() {
        let path = Path::decode("src-port;core-1;dst-port;");
        assert_eq!(path.terminal_hop(), Some("dst-port"));
        assert_eq!(path.hop_count(), 3);
    }

    #[test]
    fn empty_path_encodes_empty() {
        let path = Path::new(vec![]);
        assert_eq!(path.encode(), "");
        assert_eq!(Path::decode(""), path);
        assert_eq!(path.terminal_hop(), None);
    }

    #[test]
    fn untagged_sends_any() {
        assert_eq!(TagState::Untagged.wire_value(), "any");
        assert_eq!(TagState::Tagged("3021".into()).wire_value(), "3021");
    }

    #[test]
    fn snapshot_members_unify_unicast_and_group() {
        let member = MemberSnapshot {
            id: ReservationId::parse("es.net-1"),
            status: Status::Reserved,
            details: None,
            faults: Vec::new(),
        };
        let unicast = QuerySnapshot::Unicast(member.clone());
        assert_eq!(unicast.members().len(), 1);
        assert_eq!(unicast.group_id(), None);

        let group = QuerySnapshot::Group {
            id: GroupId(3),
            members: vec![member.clone(), member],
        };
        assert_eq!(group.members().len(), 2);
        assert_eq!(group.group_id(), Some(GroupId(3)));
    }
}
