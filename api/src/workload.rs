use crate::controller::ObjectMeta;
use crate::quantity::Quantity;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cpu: Quantity,
    #[serde(default)]
    pub memory: Quantity,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

impl Pod {
    /// Cumulative CPU requested by the pod's containers, in milli-units.
    pub fn cpu_milli(&self) -> i64 {
        self.spec.containers.iter().map(|c| c.cpu.milli_value()).sum()
    }

    /// Cumulative memory requested by the pod's containers, in whole units.
    pub fn memory_value(&self) -> i64 {
        self.spec.containers.iter().map(|c| c.memory.value()).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationControllerSpec {
    #[serde(default)]
    pub replicas: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationController {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicationControllerSpec,
}

/// The store objects an admission request may carry.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Pod(Pod),
    Service(Service),
    ReplicationController(ReplicationController),
}

impl Object {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Pod(pod) => &pod.metadata,
            Self::Service(service) => &service.metadata,
            Self::ReplicationController(rc) => &rc.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    pub fn as_pod(&self) -> Option<&Pod> {
        match self {
            Self::Pod(pod) => Some(pod),
            _ => None,
        }
    }

    pub fn as_replication_controller(&self) -> Option<&ReplicationController> {
        match self {
            Self::ReplicationController(rc) => Some(rc),
            _ => None,
        }
    }
}
