#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A cluster-level resource-limit admission and observation engine.
//!
//! Operators install declarative `ResourceController` objects stating allowed
//! maxima and minima for resources at namespace, pod, container, and
//! replication-controller scope. Two cooperating subsystems make them
//! effective:
//!
//! * the [`admission`] pipeline intercepts object creates and updates,
//!   rejects operations that would violate allowed maxima, and projects each
//!   admitted allocation into a `ResourceObservation` so recorded usage stays
//!   ahead of what was just admitted;
//! * the [`reconcile`] manager periodically re-derives true allocated usage
//!   from the store and publishes it back to each controller, so admission
//!   sees fresh numbers.
//!
//! Both subsystems emit the same observation object, applied by the store
//! with compare-and-set on the controller's resource version: when they race,
//! one apply wins and the loser retries (immediately for a client whose
//! admission failed closed, next tick for the reconciler). The design trades
//! global serializability for progress; usage converges within a tick or two
//! of any quiescent store state.
//!
//! The store itself is an external collaborator, reached through the
//! [`client::Client`] capability.

pub use limit_controller_admission::{
    self as admission, Attributes, Kind, Operation, ResourceLimits,
};
pub use limit_controller_api as api;
pub use limit_controller_client::{self as client, Client, SharedClient, StoreCache};
pub use limit_controller_reconcile::{self as reconcile, ResourceManager};
pub use limit_controller_runtime::{Args, Runtime};
