use crate::quantity::Quantity;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Identity shared by every stored object.
///
/// `resource_version` is an opaque token assigned by the store; it advances on
/// every mutation and gates optimistic-concurrency writes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_version: String,
}

/// The scope a limit rule aggregates over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupBy {
    Namespace,
    Pod,
    Container,
    ReplicationController,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleType {
    Max,
    Min,
}

/// A named resource dimension.
///
/// The domain is open: the canonical members below are what the built-in
/// evaluators and admission functions understand, but controllers may carry
/// arbitrary names (which the engine leaves untouched).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceName {
    Cpu,
    Memory,
    Pods,
    Services,
    ReplicationControllers,
    Replicas,
    Other(String),
}

/// Resource names mapped to quantities.
pub type ResourceList = BTreeMap<ResourceName, Quantity>;

/// One rule group: a scope, a rule type, and the limits (or observations) for
/// each named resource at that scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceControllerGroup {
    pub group_by: GroupBy,
    pub rule_type: RuleType,
    #[serde(default)]
    pub resources: ResourceList,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceControllerSpec {
    #[serde(default)]
    pub allowed: Vec<ResourceControllerGroup>,
}

/// Observed state of a controller.
///
/// Both lists are absent until the first observation completes; that absence
/// is the distinguished never-observed state and must not be conflated with
/// empty lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceControllerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<ResourceControllerGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated: Option<Vec<ResourceControllerGroup>>,
}

impl ResourceControllerStatus {
    pub fn is_observed(&self) -> bool {
        self.allowed.is_some() && self.allocated.is_some()
    }
}

/// A declarative statement of allowed resource maxima and minima, scoped to a
/// namespace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceController {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ResourceControllerSpec,
    #[serde(default)]
    pub status: ResourceControllerStatus,
}

/// A snapshot of current allocated usage for one controller.
///
/// Observations are applied against the exact `resource_version` they were
/// derived from; the store rejects them with a conflict otherwise. They are
/// content-derived, so emitting a duplicate is wasteful but never wrong.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObservation {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: ResourceControllerStatus,
}

impl ResourceObservation {
    /// An observation skeleton carrying the controller's identity and version.
    pub fn for_controller(controller: &ResourceController) -> Self {
        Self {
            metadata: controller.metadata.clone(),
            status: ResourceControllerStatus::default(),
        }
    }

    /// Projects a freshly computed allocation into the observation, creating
    /// the rule group if the controller status had none.
    pub fn set_allocated(
        &mut self,
        group_by: GroupBy,
        rule_type: RuleType,
        resource: ResourceName,
        quantity: Quantity,
    ) {
        let allocated = self.status.allocated.get_or_insert_with(Vec::new);
        let group = match allocated
            .iter_mut()
            .find(|g| g.group_by == group_by && g.rule_type == rule_type)
        {
            Some(group) => group,
            None => {
                allocated.push(ResourceControllerGroup {
                    group_by,
                    rule_type,
                    resources: ResourceList::new(),
                });
                allocated.last_mut().expect("group was just pushed")
            }
        };
        group.resources.insert(resource, quantity);
    }
}

// === impl GroupBy ===

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace => "Namespace".fmt(f),
            Self::Pod => "Pod".fmt(f),
            Self::Container => "Container".fmt(f),
            Self::ReplicationController => "ReplicationController".fmt(f),
        }
    }
}

// === impl RuleType ===

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Max => "Max".fmt(f),
            Self::Min => "Min".fmt(f),
        }
    }
}

// === impl ResourceName ===

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => "CPU".fmt(f),
            Self::Memory => "Memory".fmt(f),
            Self::Pods => "Pods".fmt(f),
            Self::Services => "Services".fmt(f),
            Self::ReplicationControllers => "ReplicationControllers".fmt(f),
            Self::Replicas => "Replicas".fmt(f),
            Self::Other(name) => name.fmt(f),
        }
    }
}

impl FromStr for ResourceName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CPU" => Self::Cpu,
            "Memory" => Self::Memory,
            "Pods" => Self::Pods,
            "Services" => Self::Services,
            "ReplicationControllers" => Self::ReplicationControllers,
            "Replicas" => Self::Replicas,
            other => Self::Other(other.to_string()),
        })
    }
}

impl Serialize for ResourceName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = ResourceName;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a resource name string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value.parse().expect("resource name parsing is infallible"))
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}
