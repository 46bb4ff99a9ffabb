#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Admission control for resource limits.
//!
//! Every intercepted create/update runs through [`ResourceLimits::admit`],
//! which checks the operation against each `ResourceController` in the
//! namespace and, when an admission function projects a prospective
//! allocation, emits a `ResourceObservation` so the controller's recorded
//! usage stays ahead of what was just admitted.

pub mod container;
pub mod namespace;
pub mod pod;
pub mod replication_controller;


use async_trait::async_trait;
use limit_controller_api::{Object, ResourceController, ResourceName, ResourceObservation};
use limit_controller_client::{self as client, Client, SharedClient};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{fmt, sync::Arc};
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// The store kinds the admission pipeline dispatches on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Pods,
    Services,
    ReplicationControllers,
}

/// One intercepted store operation.
#[derive(Clone, Debug)]
pub struct Attributes {
    pub operation: Operation,
    pub kind: Kind,
    pub namespace: String,
    pub object: Option<Object>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation would violate an allowed maximum or minimum.
    #[error("{kind} {name:?} forbidden: {reason}")]
    Forbidden {
        kind: Kind,
        name: String,
        reason: String,
    },

    /// A limit is declared but its usage has not been observed yet; the
    /// client should retry once the reconciler has published an observation.
    #[error("unable to admit {kind} {name:?}: waiting for a resource observation to complete")]
    WaitingForObservation { kind: Kind, name: String },

    /// The store could not be consulted or the observation could not be
    /// applied; admission fails closed.
    #[error("unable to {operation} {kind} {name:?}: error enforcing resource limits")]
    CannotEnforce {
        operation: Operation,
        kind: Kind,
        name: String,
        #[source]
        source: client::Error,
    },
}

/// One admission plug-in.
///
/// Functions are invoked in registration order for every controller in the
/// namespace. A function that projects a prospective allocation into the
/// observation returns `true`; any error aborts the whole admission.
#[async_trait]
pub trait AdmissionFunc: Send + Sync {
    async fn admit(
        &self,
        attrs: &Attributes,
        controller: &ResourceController,
        observation: &mut ResourceObservation,
        client: &dyn Client,
    ) -> Result<bool, Error>;
}

static FUNCS: Lazy<Mutex<Vec<(&'static str, Arc<dyn AdmissionFunc>)>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Registers an admission function plug-in.
///
/// # Panics
///
/// Registering the same name twice is a startup bug and aborts the process.
pub fn register(name: &'static str, func: Arc<dyn AdmissionFunc>) {
    let mut funcs = FUNCS.lock();
    if funcs.iter().any(|(registered, _)| *registered == name) {
        panic!("admission function plug-in {name:?} was registered twice");
    }
    debug!(%name, "registered admission function plug-in");
    funcs.push((name, func));
}

/// A snapshot of the registered admission functions, in registration order.
pub fn admission_funcs() -> Vec<Arc<dyn AdmissionFunc>> {
    FUNCS.lock().iter().map(|(_, func)| func.clone()).collect()
}

/// The admission controller: gates operations on every controller in the
/// object's namespace.
pub struct ResourceLimits {
    client: SharedClient,
    funcs: Vec<Arc<dyn AdmissionFunc>>,
}

// === impl ResourceLimits ===

impl ResourceLimits {
    /// Builds the controller over the process-wide registered functions.
    pub fn new(client: SharedClient) -> Self {
        Self::with_funcs(client, admission_funcs())
    }

    pub fn with_funcs(client: SharedClient, funcs: Vec<Arc<dyn AdmissionFunc>>) -> Self {
        Self { client, funcs }
    }

    /// Admits or rejects one operation.
    ///
    /// Each controller is processed independently: its observation snapshot
    /// carries the controller's resource version, so a concurrent mutation
    /// surfaces as an apply failure and the admission fails closed.
    pub async fn admit(&self, attrs: &Attributes) -> Result<(), Error> {
        let name = attrs.name();

        let controllers = self
            .client
            .list_resource_controllers(Some(&attrs.namespace))
            .await
            .map_err(|source| Error::CannotEnforce {
                operation: attrs.operation,
                kind: attrs.kind,
                name: name.to_string(),
                source,
            })?;

        for controller in &controllers {
            let mut observation = ResourceObservation::for_controller(controller);
            observation.status.allowed = controller.status.allowed.clone();
            observation.status.allocated = controller.status.allocated.clone();

            let mut dirty = false;
            for func in &self.funcs {
                dirty |= func
                    .admit(attrs, controller, &mut observation, &*self.client)
                    .await?;
            }

            if dirty {
                if let Err(source) = self.client.create_observation(&observation).await {
                    return Err(Error::CannotEnforce {
                        operation: attrs.operation,
                        kind: attrs.kind,
                        name: name.to_string(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}

// === impl Attributes ===

impl Attributes {
    /// The display name of the inbound object.
    pub fn name(&self) -> &str {
        self.object.as_ref().map_or("Unknown", Object::name)
    }
}

// === impl Kind ===

impl Kind {
    /// The namespace-scope counted resource for this kind.
    pub fn counted_resource(&self) -> ResourceName {
        match self {
            Self::Pods => ResourceName::Pods,
            Self::Services => ResourceName::Services,
            Self::ReplicationControllers => ResourceName::ReplicationControllers,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pods => "pods".fmt(f),
            Self::Services => "services".fmt(f),
            Self::ReplicationControllers => "replicationControllers".fmt(f),
        }
    }
}

// === impl Operation ===

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => "CREATE".fmt(f),
            Self::Update => "UPDATE".fmt(f),
            Self::Delete => "DELETE".fmt(f),
        }
    }
}
