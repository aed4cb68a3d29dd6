use crate::gri::GroupId;
use crate::model::Status;
use crate::service::ServiceError;

#[derive(Debug)]
pub enum MultipathError {
    /// Bad caller input, rejected before any remote call.
    InvalidRequest(&'static str),
    /// Explicit fault from the remote service; aborts the operation it
    /// occurred in (per-member faults inside a fan-out are captured in the
    /// member's slot instead).
    Fault {
        id: Option<String>,
        message: String,
    },
    /// Transport failure talking to the remote service.
    Unavailable(String),
    /// Unreadable or malformed registry/counter state.
    Registry(String),
    UnknownGroup(GroupId),
    /// Add was asked to clone a circuit that is not RESERVED or ACTIVE.
    NotCloneable { id: String, status: Status },
    /// The caller-supplied operation timeout elapsed. Reservations already
    /// made are not undone.
    DeadlineExceeded,
}

impl std::fmt::Display for MultipathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipathError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            MultipathError::Fault { id: Some(id), message } => {
                write!(f, "service fault for {id}: {message}")
            }
            MultipathError::Fault { id: None, message } => {
                write!(f, "service fault: {message}")
            }
            MultipathError::Unavailable(msg) => write!(f, "service unavailable: {msg}"),
            MultipathError::Registry(msg) => write!(f, "registry error: {msg}"),
            MultipathError::UnknownGroup(id) => write!(f, "no such group: {id}"),
            MultipathError::NotCloneable { id, status } => {
                write!(f, "cannot clone {id}: status is {status}")
            }
            MultipathError::DeadlineExceeded => write!(f, "operation deadline exceeded"),
        }
    }
}

impl std::error::Error for MultipathError {}

impl From<ServiceError> for MultipathError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Fault(message) => MultipathError::Fault { id: None, message },
            ServiceError::Unavailable(message) => MultipathError::Unavailable(message),
        }
    }
}
