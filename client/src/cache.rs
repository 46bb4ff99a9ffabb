use crate::client::{Error, SharedClient};
use limit_controller_api::{Pod, ReplicationController, Service};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Memoized store listings scoped to a single reconciler task.
///
/// Several evaluators for one controller need the same listing; the cache
/// fetches each kind at most once. Lookups are memoized by kind, so a cache
/// serves exactly one namespace and must not outlive its tick.
pub struct StoreCache {
    client: SharedClient,
    pods: OnceCell<Arc<Vec<Pod>>>,
    services: OnceCell<Arc<Vec<Service>>>,
    replication_controllers: OnceCell<Arc<Vec<ReplicationController>>>,
}

impl StoreCache {
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            pods: OnceCell::new(),
            services: OnceCell::new(),
            replication_controllers: OnceCell::new(),
        }
    }

    pub async fn pods(&self, namespace: &str) -> Result<Arc<Vec<Pod>>, Error> {
        self.pods
            .get_or_try_init(|| async { self.client.list_pods(namespace).await.map(Arc::new) })
            .await
            .cloned()
    }

    pub async fn services(&self, namespace: &str) -> Result<Arc<Vec<Service>>, Error> {
        self.services
            .get_or_try_init(|| async { self.client.list_services(namespace).await.map(Arc::new) })
            .await
            .cloned()
    }

    pub async fn replication_controllers(
        &self,
        namespace: &str,
    ) -> Result<Arc<Vec<ReplicationController>>, Error> {
        self.replication_controllers
            .get_or_try_init(|| async {
                self.client
                    .list_replication_controllers(namespace)
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}
