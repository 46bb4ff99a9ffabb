//! An in-memory [`Client`] for tests.
//!
//! Observations apply exactly the way the external registry applies them:
//! compare-and-set against the controller's resource version, replace the
//! status, and advance the version. Every method is recorded in an action log
//! so tests can assert on store traffic.

use crate::client::{Client, Error};
use async_trait::async_trait;
use limit_controller_api::{
    Pod, ReplicationController, ResourceController, ResourceObservation, Service,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
pub struct FakeClient {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    controllers: Vec<ResourceController>,
    pods: Vec<Pod>,
    services: Vec<Service>,
    replication_controllers: Vec<ReplicationController>,

    observations: Vec<ResourceObservation>,
    actions: Vec<String>,

    fail_lists: bool,
    fail_observations: bool,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_controller(&self, controller: ResourceController) {
        self.state.lock().controllers.push(controller);
    }

    pub fn push_pod(&self, pod: Pod) {
        self.state.lock().pods.push(pod);
    }

    pub fn push_service(&self, service: Service) {
        self.state.lock().services.push(service);
    }

    pub fn push_replication_controller(&self, rc: ReplicationController) {
        self.state.lock().replication_controllers.push(rc);
    }

    pub fn set_pods(&self, pods: Vec<Pod>) {
        self.state.lock().pods = pods;
    }

    /// The controller as the store currently holds it.
    pub fn controller(&self, namespace: &str, name: &str) -> Option<ResourceController> {
        self.state
            .lock()
            .controllers
            .iter()
            .find(|c| c.metadata.namespace == namespace && c.metadata.name == name)
            .cloned()
    }

    /// Every observation successfully applied, in order.
    pub fn observations(&self) -> Vec<ResourceObservation> {
        self.state.lock().observations.clone()
    }

    /// Every client call, in order.
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn fail_lists(&self, fail: bool) {
        self.state.lock().fail_lists = fail;
    }

    pub fn fail_observations(&self, fail: bool) {
        self.state.lock().fail_observations = fail;
    }

    fn record(state: &mut State, action: &str) {
        state.actions.push(action.to_string());
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn list_resource_controllers(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ResourceController>, Error> {
        let mut state = self.state.lock();
        Self::record(&mut state, "list-resource-controllers");
        if state.fail_lists {
            return Err(Error::Api(anyhow::anyhow!("injected list failure")));
        }
        Ok(state
            .controllers
            .iter()
            .filter(|c| namespace.map_or(true, |ns| c.metadata.namespace == ns))
            .cloned()
            .collect())
    }

    async fn get_resource_controller(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceController, Error> {
        let mut state = self.state.lock();
        Self::record(&mut state, "get-resource-controller");
        state
            .controllers
            .iter()
            .find(|c| c.metadata.namespace == namespace && c.metadata.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "resourceControllers",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn create_observation(&self, observation: &ResourceObservation) -> Result<(), Error> {
        let mut state = self.state.lock();
        Self::record(&mut state, "create-observation");
        if state.fail_observations {
            return Err(Error::Api(anyhow::anyhow!("injected observation failure")));
        }

        let controller = state
            .controllers
            .iter_mut()
            .find(|c| {
                c.metadata.namespace == observation.metadata.namespace
                    && c.metadata.name == observation.metadata.name
            })
            .ok_or_else(|| Error::NotFound {
                kind: "resourceControllers",
                namespace: observation.metadata.namespace.clone(),
                name: observation.metadata.name.clone(),
            })?;

        if controller.metadata.resource_version != observation.metadata.resource_version {
            return Err(Error::Conflict {
                kind: "resourceObservations",
                namespace: observation.metadata.namespace.clone(),
                name: observation.metadata.name.clone(),
            });
        }

        controller.status = observation.status.clone();
        let version = controller
            .metadata
            .resource_version
            .parse::<u64>()
            .unwrap_or(0);
        controller.metadata.resource_version = (version + 1).to_string();

        state.observations.push(observation.clone());
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, Error> {
        let mut state = self.state.lock();
        Self::record(&mut state, "list-pods");
        if state.fail_lists {
            return Err(Error::Api(anyhow::anyhow!("injected list failure")));
        }
        Ok(state
            .pods
            .iter()
            .filter(|p| p.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, Error> {
        let mut state = self.state.lock();
        Self::record(&mut state, "list-services");
        if state.fail_lists {
            return Err(Error::Api(anyhow::anyhow!("injected list failure")));
        }
        Ok(state
            .services
            .iter()
            .filter(|s| s.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_replication_controllers(
        &self,
        namespace: &str,
    ) -> Result<Vec<ReplicationController>, Error> {
        let mut state = self.state.lock();
        Self::record(&mut state, "list-replication-controllers");
        if state.fail_lists {
            return Err(Error::Api(anyhow::anyhow!("injected list failure")));
        }
        Ok(state
            .replication_controllers
            .iter()
            .filter(|rc| rc.metadata.namespace == namespace)
            .cloned()
            .collect())
    }
}
