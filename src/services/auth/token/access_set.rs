//! Resource-keyed action sets, for both requested and granted access.
use std::collections::{HashMap, HashSet};

use crate::services::auth::{Access, Resource};

use super::claims::ResourceActions;

const WILDCARD: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet(HashSet<String>);

impl ActionSet {
    /// True when `action` or the wildcard is present.
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action) || self.0.contains(WILDCARD)
    }

    fn sorted(&self) -> Vec<&str> {
        let mut actions: Vec<_> = self.0.iter().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSet(HashMap<Resource, ActionSet>);

impl AccessSet {
    pub fn from_records(records: &[Access]) -> Self {
        let mut set = Self::default();
        for access in records {
            set.0
                .entry(access.resource.clone())
                .or_default()
                .0
                .insert(access.action.clone());
        }
        set
    }

    pub fn from_grants(grants: &[ResourceActions]) -> Self {
        let mut set = Self::default();
        for grant in grants {
            set.0
                .entry(Resource::new(&grant.kind, &grant.name))
                .or_default()
                .0
                .extend(grant.actions.iter().cloned());
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, access: &Access) -> bool {
        self.0
            .get(&access.resource)
            .is_some_and(|actions| actions.contains(&access.action))
    }

    /// `type:name:a,b type:name:c`, ordered for stable headers.
    pub fn scope_param(&self) -> String {
        let mut resources: Vec<_> = self.0.iter().collect();
        resources.sort_by(|a, b| a.0.cmp(b.0));
        resources
            .into_iter()
            .map(|(r, actions)| format!("{}:{}:{}", r.kind, r.name, actions.sorted().join(",")))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(name: &str, action: &str) -> Access {
        Access::new(Resource::new("canary", name), action)
    }

    #[test]
    fn wildcard_grants_any_action() {
        let granted = AccessSet::from_grants(&[ResourceActions {
            kind: "canary".into(),
            name: "a".into(),
            actions: vec!["*".into()],
        }]);

        assert!(granted.contains(&access("a", "kill")));
        assert!(!granted.contains(&access("b", "read")));
    }

    #[test]
    fn scope_param_groups_actions_per_resource() {
        let requested = AccessSet::from_records(&[
            access("b", "write"),
            access("a", "read"),
            access("b", "read"),
        ]);
        assert_eq!(requested.scope_param(), "canary:a:read canary:b:read,write");
        assert_eq!(AccessSet::default().scope_param(), "");
    }
}
