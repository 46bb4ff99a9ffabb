use async_trait::async_trait;
use limit_controller_api::{
    Pod, ReplicationController, ResourceController, ResourceObservation, Service,
};
use std::sync::Arc;

pub type SharedClient = Arc<dyn Client>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object moved on since the caller read it; the write was rejected.
    #[error("conflict: {kind} {namespace}/{name} has a newer resource version")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

/// Capability to reach the authoritative object store.
///
/// Observation creates apply atomically against the observation's resource
/// version; a mismatch fails with [`Error::Conflict`] and the caller decides
/// whether to surface or retry.
#[async_trait]
pub trait Client: Send + Sync {
    /// Lists resource controllers, across all namespaces when `namespace` is
    /// `None`.
    async fn list_resource_controllers(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ResourceController>, Error>;

    async fn get_resource_controller(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceController, Error>;

    async fn create_observation(&self, observation: &ResourceObservation) -> Result<(), Error>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, Error>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, Error>;

    async fn list_replication_controllers(
        &self,
        namespace: &str,
    ) -> Result<Vec<ReplicationController>, Error>;
}
