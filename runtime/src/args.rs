use anyhow::{anyhow, bail, Result};
use clap::Parser;
use limit_controller_admission::{self as admission, ResourceLimits};
use limit_controller_client::SharedClient;
use limit_controller_reconcile::{self as reconcile, ResourceManager};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

const DEFAULT_ADMISSION_PLUGINS: &str = "ResourceLimitsNamespace,ResourceLimitsPod,\
ResourceLimitsContainer,ResourceLimitsReplicationController";

#[derive(Debug, Parser)]
#[clap(name = "limit-controller", about = "A resource limit controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "limit_controller=info,warn",
        env = "LIMIT_CONTROLLER_LOG"
    )]
    log_level: String,

    /// Seconds between observation reconciler ticks.
    #[clap(long, default_value = "10")]
    reconciliation_period_secs: u64,

    /// Observer plug-ins to enable.
    #[clap(long, default_value = reconcile::observer::PLUGIN_NAME)]
    observer_plugins: String,

    /// Admission plug-ins to enable, in invocation order.
    #[clap(long, default_value = DEFAULT_ADMISSION_PLUGINS)]
    admission_plugins: String,
}

/// A running engine: the admission interceptor plus its background
/// reconciler.
pub struct Runtime {
    admission: ResourceLimits,
    shutdown: CancellationToken,
    reconciler: JoinHandle<()>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

// === impl Args ===

impl Args {
    /// Initializes process-wide tracing from `--log-level`.
    pub fn init_logging(&self) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::try_new(&self.log_level)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow!(e))
    }

    /// Registers the enabled plug-ins and starts the engine against `client`.
    ///
    /// Must be called from within a tokio runtime; the reconciler is spawned
    /// onto it.
    pub fn build(self, client: SharedClient) -> Result<Runtime> {
        if self.reconciliation_period_secs == 0 {
            bail!("--reconciliation-period-secs must be greater than zero");
        }
        let period = Duration::from_secs(self.reconciliation_period_secs);

        for name in plugin_names(&self.observer_plugins) {
            match name {
                reconcile::observer::PLUGIN_NAME => reconcile::observer::register(),
                name => bail!("unrecognized observer plug-in {name:?}"),
            }
        }
        for name in plugin_names(&self.admission_plugins) {
            match name {
                admission::namespace::PLUGIN_NAME => admission::namespace::register(),
                admission::pod::PLUGIN_NAME => admission::pod::register(),
                admission::container::PLUGIN_NAME => admission::container::register(),
                admission::replication_controller::PLUGIN_NAME => {
                    admission::replication_controller::register()
                }
                name => bail!("unrecognized admission plug-in {name:?}"),
            }
        }

        let observers = reconcile::init_observers()?;
        let manager = Arc::new(ResourceManager::new(client.clone(), observers));
        let admission = ResourceLimits::new(client);

        let shutdown = CancellationToken::new();
        let reconciler = tokio::spawn(
            {
                let manager = manager.clone();
                let shutdown = shutdown.clone();
                async move { manager.run(period, shutdown).await }
            }
            .instrument(info_span!("reconciler")),
        );

        info!(
            period_secs = self.reconciliation_period_secs,
            "resource limit engine started"
        );
        Ok(Runtime {
            admission,
            shutdown,
            reconciler,
        })
    }
}

fn plugin_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|name| !name.is_empty())
}

// === impl Runtime ===

impl Runtime {
    /// The admission interceptor, for the embedding request path.
    pub fn admission(&self) -> &ResourceLimits {
        &self.admission
    }

    /// Stops the reconciler, draining any in-flight tick.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.reconciler.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limit_controller_client::fake::FakeClient;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("limit-controller").chain(args.iter().copied()))
            .expect("args must parse")
    }

    #[test]
    fn defaults_enable_every_builtin_plugin() {
        let args = parse(&[]);
        assert_eq!(args.reconciliation_period_secs, 10);
        assert_eq!(plugin_names(&args.observer_plugins).count(), 1);
        assert_eq!(plugin_names(&args.admission_plugins).count(), 4);
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let args = parse(&["--reconciliation-period-secs", "0"]);
        let err = args.build(FakeClient::new()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"), "{err}");
    }

    #[tokio::test]
    async fn unknown_plugins_are_rejected() {
        let args = parse(&["--observer-plugins", "Bogus"]);
        let err = args.build(FakeClient::new()).unwrap_err();
        assert!(err.to_string().contains("unrecognized observer"), "{err}");
    }

    #[tokio::test]
    async fn build_starts_and_shutdown_drains() {
        let client = FakeClient::new();
        let runtime = parse(&["--reconciliation-period-secs", "1"])
            .build(client.clone())
            .expect("engine must start");

        let attrs = limit_controller_admission::Attributes {
            operation: limit_controller_admission::Operation::Create,
            kind: limit_controller_admission::Kind::Pods,
            namespace: "ns-0".to_string(),
            object: None,
        };
        runtime
            .admission()
            .admit(&attrs)
            .await
            .expect("an unconstrained namespace must admit");

        runtime.shutdown().await;
    }
}
