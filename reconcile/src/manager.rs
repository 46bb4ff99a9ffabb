use crate::{EvaluatorFn, Observer};
use ahash::AHashMap as HashMap;
use anyhow::Result;
use limit_controller_api::{
    allowed_and_allocated, ResourceController, ResourceControllerGroup, ResourceList, ResourceName,
    ResourceObservation, RuleKey,
};
use limit_controller_client::{SharedClient, StoreCache};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Periodically re-derives the true allocated usage of every controller from
/// the store and records an observation whenever it drifts from the status
/// last published.
pub struct ResourceManager {
    client: SharedClient,
    evaluators: Arc<HashMap<RuleKey, EvaluatorFn>>,
}

// === impl ResourceManager ===

impl ResourceManager {
    /// Builds the manager over the given observer plug-ins.
    ///
    /// # Panics
    ///
    /// Two observers binding the same rule key is a startup bug and aborts
    /// the process.
    pub fn new(client: SharedClient, observers: Vec<Box<dyn Observer>>) -> Self {
        let mut evaluators = HashMap::default();
        for observer in &observers {
            for binding in observer.bindings() {
                let key = RuleKey::new(binding.group_by, binding.rule_type, binding.resource);
                if evaluators.insert(key.clone(), binding.func).is_some() {
                    panic!("evaluator for rule key {key:?} was registered twice");
                }
            }
        }
        Self {
            client,
            evaluators: Arc::new(evaluators),
        }
    }

    /// Runs periodic synchronization until `shutdown` is cancelled.
    ///
    /// The tick body is awaited inline, so a new tick cannot start until the
    /// previous tick's tasks have all settled and cancellation drains the
    /// in-flight tick before returning.
    pub async fn run(&self, period: Duration, shutdown: CancellationToken) {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => self.synchronize().await,
            }
        }
    }

    /// One tick: list every controller and fan out one task per controller.
    ///
    /// Task failures are logged and do not abort peers; a listing failure
    /// makes the tick empty.
    pub async fn synchronize(&self) {
        let controllers = match self.client.list_resource_controllers(None).await {
            Ok(controllers) => controllers,
            Err(error) => {
                error!(%error, "synchronization error");
                return;
            }
        };

        let mut tasks = JoinSet::new();
        for controller in controllers {
            let client = self.client.clone();
            let evaluators = self.evaluators.clone();
            tasks.spawn(async move {
                let namespace = controller.metadata.namespace.clone();
                let name = controller.metadata.name.clone();
                debug!(%namespace, %name, "periodic sync");
                if let Err(error) = sync_controller(client, evaluators, controller).await {
                    error!(%namespace, %name, %error, "error synchronizing");
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }
}

/// Re-derives one controller's allocated usage and records an observation if
/// it drifted.
async fn sync_controller(
    client: SharedClient,
    evaluators: Arc<HashMap<RuleKey, EvaluatorFn>>,
    controller: ResourceController,
) -> Result<()> {
    // The observation is applied against the resource version the controller
    // was listed at; if the controller moves on first, the apply conflicts
    // and the next tick picks it up.
    let mut observation = ResourceObservation::for_controller(&controller);
    observation.status.allowed = Some(controller.spec.allowed.clone());

    // What we previously recorded as usage, to compare with the latest
    // evaluations.
    let (_, prev_allocated) = allowed_and_allocated(&controller.status);

    // A controller that has never been observed always gets an observation.
    let mut dirty = !controller.status.is_observed();

    // Evaluators for this controller share one cache so the task fetches each
    // listing at most once. The cache dies with the task.
    let cache = StoreCache::new(client.clone());

    let mut allocated = Vec::with_capacity(controller.spec.allowed.len());
    for group in &controller.spec.allowed {
        let mut latest = ResourceControllerGroup {
            group_by: group.group_by,
            rule_type: group.rule_type,
            resources: ResourceList::new(),
        };

        for resource in group.resources.keys() {
            let key = RuleKey::new(group.group_by, group.rule_type, resource.clone());
            let Some(evaluator) = evaluators.get(&key) else {
                continue;
            };

            let quantity = evaluator(&cache, &controller.metadata.namespace).await?;

            let previous = prev_allocated
                .get(&group.group_by)
                .and_then(|rules| rules.get(&group.rule_type))
                .and_then(|resources| resources.get(resource))
                .copied()
                .unwrap_or_default();
            // CPU drift is milli-granular; everything else compares whole
            // units.
            dirty = dirty
                || match resource {
                    ResourceName::Cpu => quantity.milli_value() != previous.milli_value(),
                    _ => quantity.value() != previous.value(),
                };

            latest.resources.insert(resource.clone(), quantity);
        }

        allocated.push(latest);
    }
    observation.status.allocated = Some(allocated);

    if dirty {
        client.create_observation(&observation).await?;
    }
    Ok(())
}
