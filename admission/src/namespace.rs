//! Namespace-scope admission: caps on object counts per kind and on the
//! namespace's cumulative pod CPU and memory.

use crate::{AdmissionFunc, Attributes, Error, Kind, Operation};
use async_trait::async_trait;
use limit_controller_api::{
    allowed_and_allocated, Format, GroupBy, Object, Quantity, ResourceController, ResourceName,
    ResourceObservation, RuleType,
};
use limit_controller_client::Client;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "ResourceLimitsNamespace";

pub fn register() {
    crate::register(PLUGIN_NAME, Arc::new(NamespaceLimits));
}

pub struct NamespaceLimits;

#[async_trait]
impl AdmissionFunc for NamespaceLimits {
    async fn admit(
        &self,
        attrs: &Attributes,
        controller: &ResourceController,
        observation: &mut ResourceObservation,
        _client: &dyn Client,
    ) -> Result<bool, Error> {
        let mut dirty = false;

        if attrs.operation == Operation::Delete {
            return Ok(dirty);
        }

        let (allowed, allocated) = allowed_and_allocated(&controller.status);
        let Some(allowed_rules) = allowed.get(&GroupBy::Namespace) else {
            return Ok(dirty);
        };
        let allocated_rules = allocated.get(&GroupBy::Namespace);

        // TODO: handle Update
        if attrs.operation != Operation::Create {
            return Ok(dirty);
        }

        let Some(allowed_max) = allowed_rules.get(&RuleType::Max) else {
            return Ok(dirty);
        };
        let allocated_max = allocated_rules.and_then(|rules| rules.get(&RuleType::Max));

        // Caps on how many objects of this kind the namespace may hold.
        let counted = attrs.kind.counted_resource();
        if let Some(limit) = allowed_max.get(&counted) {
            let observed = allocated_max
                .and_then(|resources| resources.get(&counted))
                .copied()
                .ok_or_else(|| Error::WaitingForObservation {
                    kind: attrs.kind,
                    name: attrs.name().to_string(),
                })?;

            if observed.value() >= limit.value() {
                return Err(Error::Forbidden {
                    kind: attrs.kind,
                    name: attrs.name().to_string(),
                    reason: format!(
                        "limited to {limit} {kind} in namespace {namespace}, {observed} already allocated",
                        kind = attrs.kind,
                        namespace = controller.metadata.namespace,
                    ),
                });
            }

            observation.set_allocated(
                GroupBy::Namespace,
                RuleType::Max,
                counted,
                Quantity::new(observed.value() + 1, Format::DecimalSi),
            );
            dirty = true;
        }

        // Pods additionally count against the namespace's CPU and memory.
        if attrs.kind == Kind::Pods {
            let Some(pod) = attrs.object.as_ref().and_then(Object::as_pod) else {
                return Ok(dirty);
            };

            let cpu_limit = allowed_max.get(&ResourceName::Cpu);
            let memory_limit = allowed_max.get(&ResourceName::Memory);

            if let Some(limit) = cpu_limit {
                let observed = allocated_max
                    .and_then(|resources| resources.get(&ResourceName::Cpu))
                    .copied()
                    .ok_or_else(|| Error::WaitingForObservation {
                        kind: attrs.kind,
                        name: attrs.name().to_string(),
                    })?;

                let requested = pod.cpu_milli();
                if observed.milli_value() + requested >= limit.milli_value() {
                    return Err(Error::Forbidden {
                        kind: attrs.kind,
                        name: attrs.name().to_string(),
                        reason: format!(
                            "limited to {limit} CPU in namespace {namespace}, {observed} already allocated and the pod requests {pod_cpu}",
                            namespace = controller.metadata.namespace,
                            pod_cpu = Quantity::from_millis(requested, Format::DecimalSi),
                        ),
                    });
                }

                observation.set_allocated(
                    GroupBy::Namespace,
                    RuleType::Max,
                    ResourceName::Cpu,
                    Quantity::from_millis(observed.milli_value() + requested, Format::DecimalSi),
                );
                dirty = true;
            }

            if let Some(limit) = memory_limit {
                let observed = allocated_max
                    .and_then(|resources| resources.get(&ResourceName::Memory))
                    .copied()
                    .ok_or_else(|| Error::WaitingForObservation {
                        kind: attrs.kind,
                        name: attrs.name().to_string(),
                    })?;

                let requested = pod.memory_value();
                if observed.value() + requested >= limit.value() {
                    return Err(Error::Forbidden {
                        kind: attrs.kind,
                        name: attrs.name().to_string(),
                        reason: format!(
                            "limited to {limit} memory in namespace {namespace}, {observed} already allocated and the pod requests {pod_memory}",
                            namespace = controller.metadata.namespace,
                            pod_memory = Quantity::new(requested, Format::BinarySi),
                        ),
                    });
                }

                observation.set_allocated(
                    GroupBy::Namespace,
                    RuleType::Max,
                    ResourceName::Memory,
                    Quantity::new(observed.value() + requested, Format::DecimalSi),
                );
                dirty = true;
            }
        }

        Ok(dirty)
    }
}
