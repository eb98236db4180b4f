//! GlobalRole: a role whose rules apply globally, per-cluster, and/or to
//! fleet workspaces.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::policy_rule::PolicyRule;

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FleetWorkspacePermission {
    #[serde(default)]
    pub resource_rules: Vec<PolicyRule>,
    #[serde(default)]
    pub workspace_verbs: Vec<String>,
}

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "GlobalRole",
    shortname = "gr"
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRoleSpec {
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub namespaced_rules: BTreeMap<String, Vec<PolicyRule>>,
    /// RoleTemplate names applied in downstream clusters.
    #[serde(default)]
    pub inherited_cluster_roles: Vec<String>,
    #[serde(default)]
    pub inherited_fleet_workspace_permissions: Option<FleetWorkspacePermission>,
}
