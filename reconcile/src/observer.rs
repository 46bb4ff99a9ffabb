//! The built-in observer: canonical evaluators for every rule key the
//! built-in admission functions understand.

use crate::{register_observer, EvaluatorFn, Observer, ObserverFuncBinding};
use anyhow::Result;
use futures::future::BoxFuture;
use limit_controller_api::{Format, GroupBy, Pod, Quantity, ResourceName, RuleType};
use limit_controller_client::StoreCache;

pub const PLUGIN_NAME: &str = "ResourceLimits";

pub fn register() {
    fn factory() -> Result<Box<dyn Observer>> {
        Ok(Box::new(LimitsObserver))
    }
    register_observer(PLUGIN_NAME, factory);
}

pub struct LimitsObserver;

impl Observer for LimitsObserver {
    fn bindings(&self) -> Vec<ObserverFuncBinding> {
        let mut bindings = namespace_bindings();
        bindings.extend(pod_bindings());
        bindings.extend(container_bindings());
        bindings.extend(replication_controller_bindings());
        bindings
    }
}

fn binding(
    group_by: GroupBy,
    rule_type: RuleType,
    resource: ResourceName,
    func: EvaluatorFn,
) -> ObserverFuncBinding {
    ObserverFuncBinding {
        group_by,
        rule_type,
        resource,
        func,
    }
}

fn namespace_bindings() -> Vec<ObserverFuncBinding> {
    let group_by = GroupBy::Namespace;
    vec![
        binding(group_by, RuleType::Max, ResourceName::Cpu, namespace_cpu),
        binding(
            group_by,
            RuleType::Max,
            ResourceName::Memory,
            namespace_memory,
        ),
        binding(group_by, RuleType::Max, ResourceName::Pods, namespace_pods),
        binding(
            group_by,
            RuleType::Max,
            ResourceName::Services,
            namespace_services,
        ),
        binding(
            group_by,
            RuleType::Max,
            ResourceName::ReplicationControllers,
            namespace_replication_controllers,
        ),
    ]
}

fn pod_bindings() -> Vec<ObserverFuncBinding> {
    let group_by = GroupBy::Pod;
    vec![
        binding(group_by, RuleType::Max, ResourceName::Cpu, pod_max_cpu),
        binding(group_by, RuleType::Min, ResourceName::Cpu, pod_min_cpu),
        binding(group_by, RuleType::Max, ResourceName::Memory, pod_max_memory),
        binding(group_by, RuleType::Min, ResourceName::Memory, pod_min_memory),
    ]
}

fn container_bindings() -> Vec<ObserverFuncBinding> {
    let group_by = GroupBy::Container;
    vec![
        binding(group_by, RuleType::Max, ResourceName::Cpu, container_max_cpu),
        binding(group_by, RuleType::Min, ResourceName::Cpu, container_min_cpu),
        binding(
            group_by,
            RuleType::Max,
            ResourceName::Memory,
            container_max_memory,
        ),
        binding(
            group_by,
            RuleType::Min,
            ResourceName::Memory,
            container_min_memory,
        ),
    ]
}

fn replication_controller_bindings() -> Vec<ObserverFuncBinding> {
    vec![binding(
        GroupBy::ReplicationController,
        RuleType::Max,
        ResourceName::Replicas,
        replication_controller_max_replicas,
    )]
}

fn namespace_cpu<'a>(cache: &'a StoreCache, namespace: &'a str) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let millis = pods.iter().map(Pod::cpu_milli).sum();
        Ok(Quantity::from_millis(millis, Format::DecimalSi))
    })
}

fn namespace_memory<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let value = pods.iter().map(Pod::memory_value).sum();
        Ok(Quantity::new(value, Format::DecimalSi))
    })
}

fn namespace_pods<'a>(cache: &'a StoreCache, namespace: &'a str) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        Ok(Quantity::new(pods.len() as i64, Format::DecimalSi))
    })
}

fn namespace_services<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let services = cache.services(namespace).await?;
        Ok(Quantity::new(services.len() as i64, Format::DecimalSi))
    })
}

fn namespace_replication_controllers<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let rcs = cache.replication_controllers(namespace).await?;
        Ok(Quantity::new(rcs.len() as i64, Format::DecimalSi))
    })
}

fn pod_max_cpu<'a>(cache: &'a StoreCache, namespace: &'a str) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let millis = pods.iter().map(Pod::cpu_milli).max().unwrap_or(0);
        Ok(Quantity::from_millis(millis, Format::DecimalSi))
    })
}

fn pod_min_cpu<'a>(cache: &'a StoreCache, namespace: &'a str) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let millis = pods.iter().map(Pod::cpu_milli).min().unwrap_or(0);
        Ok(Quantity::from_millis(millis, Format::DecimalSi))
    })
}

fn pod_max_memory<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let value = pods.iter().map(Pod::memory_value).max().unwrap_or(0);
        Ok(Quantity::new(value, Format::DecimalSi))
    })
}

fn pod_min_memory<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let value = pods.iter().map(Pod::memory_value).min().unwrap_or(0);
        Ok(Quantity::new(value, Format::DecimalSi))
    })
}

fn container_max_cpu<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let millis = containers(&pods)
            .map(|c| c.cpu.milli_value())
            .max()
            .unwrap_or(0);
        Ok(Quantity::from_millis(millis, Format::DecimalSi))
    })
}

fn container_min_cpu<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let millis = containers(&pods)
            .map(|c| c.cpu.milli_value())
            .min()
            .unwrap_or(0);
        Ok(Quantity::from_millis(millis, Format::DecimalSi))
    })
}

fn container_max_memory<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let value = containers(&pods)
            .map(|c| c.memory.value())
            .max()
            .unwrap_or(0);
        Ok(Quantity::new(value, Format::DecimalSi))
    })
}

fn container_min_memory<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let pods = cache.pods(namespace).await?;
        let value = containers(&pods)
            .map(|c| c.memory.value())
            .min()
            .unwrap_or(0);
        Ok(Quantity::new(value, Format::DecimalSi))
    })
}

fn replication_controller_max_replicas<'a>(
    cache: &'a StoreCache,
    namespace: &'a str,
) -> BoxFuture<'a, Result<Quantity>> {
    Box::pin(async move {
        let rcs = cache.replication_controllers(namespace).await?;
        let replicas = rcs
            .iter()
            .map(|rc| i64::from(rc.spec.replicas))
            .max()
            .unwrap_or(0);
        Ok(Quantity::new(replicas, Format::DecimalSi))
    })
}

fn containers(pods: &[Pod]) -> impl Iterator<Item = &limit_controller_api::Container> {
    pods.iter().flat_map(|pod| pod.spec.containers.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use limit_controller_api::{Container, ObjectMeta, PodSpec, ReplicationController, RuleKey};
    use limit_controller_client::fake::FakeClient;

    const NS: &str = "ns-0";

    fn quantity(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn mk_pod(name: &str, containers: &[(&str, &str, &str)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: NS.to_string(),
                ..ObjectMeta::default()
            },
            spec: PodSpec {
                containers: containers
                    .iter()
                    .map(|(name, cpu, memory)| Container {
                        name: name.to_string(),
                        cpu: quantity(cpu),
                        memory: quantity(memory),
                    })
                    .collect(),
            },
        }
    }

    async fn evaluate(
        client: &std::sync::Arc<FakeClient>,
        group_by: GroupBy,
        rule_type: RuleType,
        resource: ResourceName,
    ) -> Quantity {
        let func = LimitsObserver
            .bindings()
            .into_iter()
            .find(|b| b.group_by == group_by && b.rule_type == rule_type && b.resource == resource)
            .map(|b| b.func)
            .expect("binding must exist");
        let cache = StoreCache::new(client.clone());
        func(&cache, NS).await.expect("evaluation must succeed")
    }

    #[tokio::test]
    async fn namespace_evaluators_aggregate_pods() {
        let client = FakeClient::new();
        client.push_pod(mk_pod("pod-0", &[("a", "250m", "256Mi"), ("b", "50m", "256Mi")]));
        client.push_pod(mk_pod("pod-1", &[("c", "700m", "512Mi")]));

        let cpu = evaluate(&client, GroupBy::Namespace, RuleType::Max, ResourceName::Cpu).await;
        assert_eq!(cpu.milli_value(), 1000);

        let memory = evaluate(
            &client,
            GroupBy::Namespace,
            RuleType::Max,
            ResourceName::Memory,
        )
        .await;
        assert_eq!(memory.value(), 1024 * 1024 * 1024);

        let pods = evaluate(
            &client,
            GroupBy::Namespace,
            RuleType::Max,
            ResourceName::Pods,
        )
        .await;
        assert_eq!(pods.value(), 2);
    }

    #[tokio::test]
    async fn pod_evaluators_take_extremes_of_pod_sums() {
        let client = FakeClient::new();
        client.push_pod(mk_pod("pod-0", &[("a", "250m", "256Mi"), ("b", "50m", "128Mi")]));
        client.push_pod(mk_pod("pod-1", &[("c", "100m", "512Mi")]));

        let max = evaluate(&client, GroupBy::Pod, RuleType::Max, ResourceName::Cpu).await;
        assert_eq!(max.milli_value(), 300);

        let min = evaluate(&client, GroupBy::Pod, RuleType::Min, ResourceName::Cpu).await;
        assert_eq!(min.milli_value(), 100);

        let max_memory = evaluate(&client, GroupBy::Pod, RuleType::Max, ResourceName::Memory).await;
        assert_eq!(max_memory.value(), 512 * 1024 * 1024);
    }

    #[tokio::test]
    async fn container_evaluators_take_extremes_of_containers() {
        let client = FakeClient::new();
        client.push_pod(mk_pod("pod-0", &[("a", "250m", "256Mi"), ("b", "50m", "128Mi")]));

        let max = evaluate(&client, GroupBy::Container, RuleType::Max, ResourceName::Cpu).await;
        assert_eq!(max.milli_value(), 250);

        let min = evaluate(&client, GroupBy::Container, RuleType::Min, ResourceName::Cpu).await;
        assert_eq!(min.milli_value(), 50);

        let min_memory =
            evaluate(&client, GroupBy::Container, RuleType::Min, ResourceName::Memory).await;
        assert_eq!(min_memory.value(), 128 * 1024 * 1024);
    }

    #[tokio::test]
    async fn min_evaluators_yield_zero_on_empty_namespaces() {
        let client = FakeClient::new();
        for (group_by, rule_type, resource) in [
            (GroupBy::Pod, RuleType::Min, ResourceName::Cpu),
            (GroupBy::Pod, RuleType::Min, ResourceName::Memory),
            (GroupBy::Container, RuleType::Min, ResourceName::Cpu),
            (GroupBy::Container, RuleType::Min, ResourceName::Memory),
        ] {
            let q = evaluate(&client, group_by, rule_type, resource).await;
            assert_eq!(q.milli_value(), 0);
        }
    }

    #[tokio::test]
    async fn replication_controller_evaluator_takes_max_replicas() {
        let client = FakeClient::new();
        for (name, replicas) in [("rc-0", 2), ("rc-1", 5)] {
            client.push_replication_controller(ReplicationController {
                metadata: ObjectMeta {
                    name: name.to_string(),
                    namespace: NS.to_string(),
                    ..ObjectMeta::default()
                },
                spec: limit_controller_api::ReplicationControllerSpec { replicas },
            });
        }

        let q = evaluate(
            &client,
            GroupBy::ReplicationController,
            RuleType::Max,
            ResourceName::Replicas,
        )
        .await;
        assert_eq!(q.value(), 5);

        let services = evaluate(
            &client,
            GroupBy::Namespace,
            RuleType::Max,
            ResourceName::Services,
        )
        .await;
        assert_eq!(services.value(), 0);
    }

    #[test]
    fn binds_every_canonical_rule_key_once() {
        let bindings = LimitsObserver.bindings();
        assert_eq!(bindings.len(), 14);

        let mut keys: Vec<RuleKey> = bindings
            .iter()
            .map(|b| RuleKey::new(b.group_by, b.rule_type, b.resource.clone()))
            .collect();
        keys.sort_by_key(|k| format!("{k:?}"));
        keys.dedup();
        assert_eq!(keys.len(), 14, "every rule key must be bound exactly once");
    }
}
