//! Container-scope admission: every container in the pod must sit within the
//! declared per-container ceiling and floor.

use crate::{AdmissionFunc, Attributes, Error, Kind, Operation};
use async_trait::async_trait;
use limit_controller_api::{
    allowed_and_allocated, GroupBy, Object, ResourceController, ResourceName, ResourceObservation,
    RuleType,
};
use limit_controller_client::Client;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "ResourceLimitsContainer";

pub fn register() {
    crate::register(PLUGIN_NAME, Arc::new(ContainerLimits));
}

pub struct ContainerLimits;

#[async_trait]
impl AdmissionFunc for ContainerLimits {
    async fn admit(
        &self,
        attrs: &Attributes,
        controller: &ResourceController,
        _observation: &mut ResourceObservation,
        _client: &dyn Client,
    ) -> Result<bool, Error> {
        if attrs.operation == Operation::Delete || attrs.kind != Kind::Pods {
            return Ok(false);
        }

        let (allowed, _) = allowed_and_allocated(&controller.status);
        let Some(rules) = allowed.get(&GroupBy::Container) else {
            return Ok(false);
        };
        let Some(pod) = attrs.object.as_ref().and_then(Object::as_pod) else {
            return Ok(false);
        };

        let forbidden = |reason: String| Error::Forbidden {
            kind: attrs.kind,
            name: pod.metadata.name.clone(),
            reason,
        };

        for (rule_type, resources) in rules {
            for (resource, limit) in resources {
                for container in &pod.spec.containers {
                    match (rule_type, resource) {
                        (RuleType::Max, ResourceName::Memory) => {
                            if container.memory.value() > limit.value() {
                                return Err(forbidden(format!(
                                    "unable to {operation} pod, container {name} requests {memory} memory which is greater than the max: {limit}",
                                    operation = attrs.operation,
                                    name = container.name,
                                    memory = container.memory,
                                )));
                            }
                        }
                        (RuleType::Max, ResourceName::Cpu) => {
                            if container.cpu.milli_value() > limit.milli_value() {
                                return Err(forbidden(format!(
                                    "unable to {operation} pod, container {name} requests {cpu} cpu which is greater than the max: {limit}",
                                    operation = attrs.operation,
                                    name = container.name,
                                    cpu = container.cpu,
                                )));
                            }
                        }
                        (RuleType::Min, ResourceName::Memory) => {
                            if container.memory.value() < limit.value() {
                                return Err(forbidden(format!(
                                    "unable to {operation} pod, container {name} requests {memory} memory which is less than the min: {limit}",
                                    operation = attrs.operation,
                                    name = container.name,
                                    memory = container.memory,
                                )));
                            }
                        }
                        (RuleType::Min, ResourceName::Cpu) => {
                            if container.cpu.milli_value() < limit.milli_value() {
                                return Err(forbidden(format!(
                                    "unable to {operation} pod, container {name} requests {cpu} cpu which is less than the min: {limit}",
                                    operation = attrs.operation,
                                    name = container.name,
                                    cpu = container.cpu,
                                )));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(false)
    }
}
