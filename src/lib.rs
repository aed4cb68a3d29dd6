//! braid — multipath and anycast orchestration over a one-circuit-per-request
//! reservation service.
//!
//! The remote service reserves a single network circuit per request. This
//! crate layers three capabilities on top of that contract:
//!
//! - **Multipath**: reserve N link-disjoint circuits for one logical request,
//!   best-effort, and track them as a named group (`MP-<n>`).
//! - **Group lifecycle**: grow a group by cloning its newest member, shrink
//!   or delete it, and fan group-wide operations out to the members.
//! - **Anycast**: resolve a set of candidate destinations down to one winner
//!   via scored trial reservations.
//!
//! The entry point is [`orchestrator::MultipathClient`], generic over the
//! [`service::CircuitService`] connection. Group membership is persisted in a
//! small file-backed [`registry::GroupRegistry`].

pub mod error;
pub mod gri;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod registry;
pub mod request;
pub mod service;

pub use error::MultipathError;
pub use orchestrator::{ClientConfig, MultipathClient};
