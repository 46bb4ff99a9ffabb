#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Usage observation for resource limits.
//!
//! Observer plug-ins bind rule keys to evaluator functions; the
//! [`ResourceManager`] periodically runs every bound evaluator against the
//! store and records a `ResourceObservation` whenever the measured allocation
//! drifts from what the controller's status last recorded.

mod manager;
pub mod observer;


pub use self::manager::ResourceManager;

use ahash::AHashMap as HashMap;
use anyhow::Result;
use futures::future::BoxFuture;
use limit_controller_api::{GroupBy, Quantity, ResourceName, RuleType};
use limit_controller_client::StoreCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

/// Computes the currently allocated quantity for one rule key in one
/// namespace.
///
/// Evaluators are pure over their inputs and fetch all store data through the
/// per-task [`StoreCache`], so one task's listings happen at most once.
pub type EvaluatorFn = for<'a> fn(&'a StoreCache, &'a str) -> BoxFuture<'a, Result<Quantity>>;

/// Associates an evaluator with the rule key it computes.
pub struct ObserverFuncBinding {
    pub group_by: GroupBy,
    pub rule_type: RuleType,
    pub resource: ResourceName,
    pub func: EvaluatorFn,
}

/// An observer plug-in: a named group of evaluator bindings.
pub trait Observer: Send + Sync {
    fn bindings(&self) -> Vec<ObserverFuncBinding>;
}

pub type ObserverFactory = fn() -> Result<Box<dyn Observer>>;

static PLUGINS: Lazy<Mutex<HashMap<String, ObserverFactory>>> =
    Lazy::new(|| Mutex::new(HashMap::default()));

/// Registers an observer plug-in.
///
/// # Panics
///
/// Registering the same name twice is a startup bug and aborts the process.
pub fn register_observer(name: &str, factory: ObserverFactory) {
    let mut plugins = PLUGINS.lock();
    if plugins.contains_key(name) {
        panic!("observer plug-in {name:?} was registered twice");
    }
    debug!(%name, "registered observer plug-in");
    plugins.insert(name.to_string(), factory);
}

/// Instantiates every registered observer plug-in.
pub fn init_observers() -> Result<Vec<Box<dyn Observer>>> {
    PLUGINS
        .lock()
        .iter()
        .map(|(name, factory)| {
            factory().map_err(|e| e.context(format!("unable to initialize observer plug-in {name:?}")))
        })
        .collect()
}
