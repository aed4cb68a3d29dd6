//! Contract with the remote circuit-reservation service.
//!
//! The service computes all physical paths; this crate only consumes its
//! request/response surface. [`CircuitService`] is the seam a transport
//! implementation (or a test double) plugs into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Epoch, PathSetupMode, ReservationDetails, Status};

/// Constraint category marking an "avoid this path" entry.
pub const MULTIPATH_CONSTRAINT: &str = "BASIC_MULTIPATH_SERVICE";

/// One optional constraint attached to a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub category: String,
    pub value: String,
}

impl Constraint {
    /// An avoidance constraint carrying one prior path encoding.
    pub fn avoid_path(encoding: impl Into<String>) -> Self {
        Self {
            category: MULTIPATH_CONSTRAINT.to_string(),
            value: encoding.into(),
        }
    }
}

/// Wire-level creation request for one unicast circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub description: String,
    pub source: String,
    pub source_tagged: bool,
    pub source_vlan: String,
    pub destination: String,
    pub destination_tagged: bool,
    pub destination_vlan: String,
    pub bandwidth: i64,
    pub setup_mode: PathSetupMode,
    pub starts_at: Epoch,
    pub ends_at: Epoch,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReply {
    pub id: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReply {
    pub details: ReservationDetails,
    pub faults: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpReply {
    pub status: Status,
}

/// Wire-level modify request. Absent fields are left unchanged remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub id: String,
    pub description: Option<String>,
    pub bandwidth: Option<i64>,
    pub starts_at: Option<Epoch>,
    pub ends_at: Option<Epoch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: String,
    pub status: Status,
}

/// Errors a service implementation can surface.
///
/// `Fault` is the remote end rejecting one operation; `Unavailable` is a
/// transport/connectivity failure and aborts whatever batch it occurs in.
#[derive(Debug, Clone)]
pub enum ServiceError {
    Fault(String),
    Unavailable(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Fault(msg) => write!(f, "service fault: {msg}"),
            ServiceError::Unavailable(msg) => write!(f, "service unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Connection to the remote reservation service.
///
/// One circuit per request: multipath semantics are layered on top by the
/// orchestrator. Implementations decide their own concurrency contract; the
/// orchestrator issues calls strictly sequentially.
#[async_trait]
pub trait CircuitService: Send + Sync {
    async fn create(&self, request: &CreateRequest) -> Result<CreateReply, ServiceError>;

    async fn query(&self, id: &str) -> Result<QueryReply, ServiceError>;

    async fn cancel(&self, id: &str) -> Result<OpReply, ServiceError>;

    async fn modify(&self, request: &ModifyRequest) -> Result<OpReply, ServiceError>;

    /// Signal path setup for a reservation created with `signal-xml`.
    async fn create_path(&self, id: &str) -> Result<OpReply, ServiceError>;

    /// Tear down the live path of an active, signalled reservation.
    async fn teardown_path(&self, id: &str) -> Result<OpReply, ServiceError>;

    /// List unicast reservations matching any of the given statuses.
    async fn list(&self, statuses: &[Status]) -> Result<Vec<ListEntry>, ServiceError>;
}
