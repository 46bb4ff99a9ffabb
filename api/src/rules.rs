use crate::controller::{
    GroupBy, ResourceControllerGroup, ResourceControllerStatus, ResourceList, ResourceName,
    RuleType,
};
use ahash::AHashMap as HashMap;

/// Identifies one quota dimension: the unit of lookup in both the observer
/// and admission registries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub group_by: GroupBy,
    pub rule_type: RuleType,
    pub resource: ResourceName,
}

impl RuleKey {
    pub fn new(group_by: GroupBy, rule_type: RuleType, resource: ResourceName) -> Self {
        Self {
            group_by,
            rule_type,
            resource,
        }
    }
}

/// Rule groups projected as scope -> rule type -> resource list.
///
/// Both projections are total: an absent key means "unconstrained", never
/// "zero".
pub type RuleMap = HashMap<GroupBy, HashMap<RuleType, ResourceList>>;

/// Projects a controller status into its allowed and allocated rule maps.
pub fn allowed_and_allocated(status: &ResourceControllerStatus) -> (RuleMap, RuleMap) {
    (
        project(status.allowed.as_deref()),
        project(status.allocated.as_deref()),
    )
}

fn project(groups: Option<&[ResourceControllerGroup]>) -> RuleMap {
    let mut by_group = RuleMap::default();
    for group in groups.into_iter().flatten() {
        by_group
            .entry(group.group_by)
            .or_default()
            .insert(group.rule_type, group.resources.clone());
    }
    by_group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::{Format, Quantity};

    fn mk_group(
        group_by: GroupBy,
        rule_type: RuleType,
        resources: impl IntoIterator<Item = (ResourceName, i64)>,
    ) -> ResourceControllerGroup {
        ResourceControllerGroup {
            group_by,
            rule_type,
            resources: resources
                .into_iter()
                .map(|(name, value)| (name, Quantity::new(value, Format::DecimalSi)))
                .collect(),
        }
    }

    #[test]
    fn projects_both_lists_by_scope_and_rule() {
        let status = ResourceControllerStatus {
            allowed: Some(vec![
                mk_group(GroupBy::Namespace, RuleType::Max, [(ResourceName::Pods, 5)]),
                mk_group(GroupBy::Pod, RuleType::Min, [(ResourceName::Cpu, 1)]),
            ]),
            allocated: Some(vec![mk_group(
                GroupBy::Namespace,
                RuleType::Max,
                [(ResourceName::Pods, 2)],
            )]),
        };

        let (allowed, allocated) = allowed_and_allocated(&status);
        assert_eq!(
            allowed[&GroupBy::Namespace][&RuleType::Max][&ResourceName::Pods].value(),
            5
        );
        assert_eq!(
            allowed[&GroupBy::Pod][&RuleType::Min][&ResourceName::Cpu].value(),
            1
        );
        assert_eq!(
            allocated[&GroupBy::Namespace][&RuleType::Max][&ResourceName::Pods].value(),
            2
        );
        assert!(!allocated.contains_key(&GroupBy::Pod));
    }

    #[test]
    fn absent_lists_project_to_empty_maps() {
        let (allowed, allocated) = allowed_and_allocated(&ResourceControllerStatus::default());
        assert!(allowed.is_empty());
        assert!(allocated.is_empty());
    }

    #[test]
    fn later_duplicate_group_replaces_earlier() {
        let status = ResourceControllerStatus {
            allowed: Some(vec![
                mk_group(GroupBy::Namespace, RuleType::Max, [(ResourceName::Pods, 5)]),
                mk_group(
                    GroupBy::Namespace,
                    RuleType::Max,
                    [(ResourceName::Services, 2)],
                ),
            ]),
            allocated: None,
        };

        let (allowed, _) = allowed_and_allocated(&status);
        let max = &allowed[&GroupBy::Namespace][&RuleType::Max];
        assert!(!max.contains_key(&ResourceName::Pods));
        assert_eq!(max[&ResourceName::Services].value(), 2);
    }
}
