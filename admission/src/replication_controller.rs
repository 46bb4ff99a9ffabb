//! Replication-controller-scope admission: a replication controller may not
//! declare more replicas than the allowed max.

use crate::{AdmissionFunc, Attributes, Error, Kind, Operation};
use async_trait::async_trait;
use limit_controller_api::{
    allowed_and_allocated, GroupBy, Object, ResourceController, ResourceName, ResourceObservation,
    RuleType,
};
use limit_controller_client::Client;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "ResourceLimitsReplicationController";

pub fn register() {
    crate::register(PLUGIN_NAME, Arc::new(ReplicationControllerLimits));
}

pub struct ReplicationControllerLimits;

#[async_trait]
impl AdmissionFunc for ReplicationControllerLimits {
    async fn admit(
        &self,
        attrs: &Attributes,
        controller: &ResourceController,
        _observation: &mut ResourceObservation,
        _client: &dyn Client,
    ) -> Result<bool, Error> {
        if attrs.operation == Operation::Delete || attrs.kind != Kind::ReplicationControllers {
            return Ok(false);
        }

        let (allowed, _) = allowed_and_allocated(&controller.status);
        let Some(rules) = allowed.get(&GroupBy::ReplicationController) else {
            return Ok(false);
        };
        let Some(rc) = attrs
            .object
            .as_ref()
            .and_then(Object::as_replication_controller)
        else {
            return Ok(false);
        };

        let replicas = i64::from(rc.spec.replicas);
        if let Some(limit) = rules
            .get(&RuleType::Max)
            .and_then(|resources| resources.get(&ResourceName::Replicas))
        {
            if replicas > limit.value() {
                return Err(Error::Forbidden {
                    kind: attrs.kind,
                    name: rc.metadata.name.clone(),
                    reason: format!("{replicas} replicas is greater than the max: {limit}"),
                });
            }
        }

        Ok(false)
    }
}
