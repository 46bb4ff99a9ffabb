//! Pod-scope admission: each pod's cumulative container CPU and memory must
//! sit within the declared per-pod ceiling and floor.

use crate::{AdmissionFunc, Attributes, Error, Kind, Operation};
use async_trait::async_trait;
use limit_controller_api::{
    allowed_and_allocated, Format, GroupBy, Object, Quantity, ResourceController, ResourceName,
    ResourceObservation, RuleType,
};
use limit_controller_client::Client;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "ResourceLimitsPod";

pub fn register() {
    crate::register(PLUGIN_NAME, Arc::new(PodLimits));
}

pub struct PodLimits;

#[async_trait]
impl AdmissionFunc for PodLimits {
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
        let Some(rules) = allowed.get(&GroupBy::Pod) else {
            return Ok(false);
        };
        let Some(pod) = attrs.object.as_ref().and_then(Object::as_pod) else {
            return Ok(false);
        };

        let cpu = Quantity::from_millis(pod.cpu_milli(), Format::DecimalSi);
        let memory = Quantity::new(pod.memory_value(), Format::BinarySi);

        let forbidden = |reason: String| Error::Forbidden {
            kind: attrs.kind,
            name: pod.metadata.name.clone(),
            reason,
        };

        for (rule_type, resources) in rules {
            for (resource, limit) in resources {
                match (rule_type, resource) {
                    (RuleType::Max, ResourceName::Memory) => {
                        if memory.value() > limit.value() {
                            return Err(forbidden(format!(
                                "pod memory usage {memory} is greater than the max: {limit}"
                            )));
                        }
                    }
                    (RuleType::Max, ResourceName::Cpu) => {
                        if cpu.milli_value() > limit.milli_value() {
                            return Err(forbidden(format!(
                                "pod CPU usage {cpu} is greater than the max: {limit}"
                            )));
                        }
                    }
                    (RuleType::Min, ResourceName::Memory) => {
                        if memory.value() < limit.value() {
                            return Err(forbidden(format!(
                                "pod memory usage {memory} is less than the min: {limit}"
                            )));
                        }
                    }
                    (RuleType::Min, ResourceName::Cpu) => {
                        if cpu.milli_value() < limit.milli_value() {
                            return Err(forbidden(format!(
                                "pod CPU usage {cpu} is less than the min: {limit}"
                            )));
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(false)
    }
}
