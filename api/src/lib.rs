#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Typed objects for the resource-limit engine.
//!
//! Everything here is a borrowed snapshot of store state: the engine never
//! owns an object beyond the admission call or reconciler tick it is serving.

mod controller;
mod quantity;
mod rules;
mod workload;

pub use self::controller::{
    GroupBy, ObjectMeta, ResourceController, ResourceControllerGroup, ResourceControllerSpec,
    ResourceControllerStatus, ResourceList, ResourceName, ResourceObservation, RuleType,
};
pub use self::quantity::{Format, ParseError, Quantity};
pub use self::rules::{allowed_and_allocated, RuleKey, RuleMap};
pub use self::workload::{
    Container, Object, Pod, PodSpec, ReplicationController, ReplicationControllerSpec, Service,
};
