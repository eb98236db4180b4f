//! The Kubernetes RBAC `PolicyRule` shape, bit-exact with `rbac.authorization.k8s.io/v1`.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const WILDCARD: &str = "*";

/// `(verbs, apiGroups, resources, resourceNames, nonResourceURLs)`.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub resource_names: Vec<String>,
    #[serde(default)]
    pub non_resource_urls: Vec<String>,
}

impl PolicyRule {
    /// Rule-of-thumb constructor used throughout tests and the privileged
    /// service-account synthetic rule.
    pub fn new(
        verbs: impl IntoIterator<Item = impl Into<String>>,
        api_groups: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            verbs: verbs.into_iter().map(Into::into).collect(),
            api_groups: api_groups.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            resource_names: Vec::new(),
            non_resource_urls: Vec::new(),
        }
    }

    pub fn non_resource(
        verbs: impl IntoIterator<Item = impl Into<String>>,
        non_resource_urls: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            verbs: verbs.into_iter().map(Into::into).collect(),
            api_groups: Vec::new(),
            resources: Vec::new(),
            resource_names: Vec::new(),
            non_resource_urls: non_resource_urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Equality disregarding field ordering.
    pub fn set_eq(&self, other: &Self) -> bool {
        fn as_set(v: &[String]) -> HashSet<&str> {
            v.iter().map(String::as_str).collect()
        }
        as_set(&self.verbs) == as_set(&other.verbs)
            && as_set(&self.api_groups) == as_set(&other.api_groups)
            && as_set(&self.resources) == as_set(&other.resources)
            && as_set(&self.resource_names) == as_set(&other.resource_names)
            && as_set(&self.non_resource_urls) == as_set(&other.non_resource_urls)
    }
}

impl From<k8s_openapi::api::rbac::v1::PolicyRule> for PolicyRule {
    fn from(r: k8s_openapi::api::rbac::v1::PolicyRule) -> Self {
        Self {
            verbs: r.verbs,
            api_groups: r.api_groups.unwrap_or_default(),
            resources: r.resources.unwrap_or_default(),
            resource_names: r.resource_names.unwrap_or_default(),
            non_resource_urls: r.non_resource_ur_ls.unwrap_or_default(),
        }
    }
}

/// The synthetic admin rule set granted to privileged service accounts:
/// wildcard verbs, groups, resources and non-resource URLs.
pub fn admin_rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule::new([WILDCARD], [WILDCARD], [WILDCARD]),
        PolicyRule::non_resource([WILDCARD], [WILDCARD]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_eq_ignores_order() {
        let a = PolicyRule::new(["get", "list"], [""], ["pods"]);
        let b = PolicyRule::new(["list", "get"], [""], ["pods"]);
        assert!(a.set_eq(&b));
    }

    #[test]
    fn set_eq_detects_difference() {
        let a = PolicyRule::new(["get"], [""], ["pods"]);
        let b = PolicyRule::new(["get"], [""], ["secrets"]);
        assert!(!a.set_eq(&b));
    }
}
