//! RoleTemplate: a named, composable bundle of policy rules.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::policy_rule::PolicyRule;

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum RoleTemplateContext {
    Cluster,
    Project,
}

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "RoleTemplate",
    shortname = "rt"
)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateSpec {
    pub context: RoleTemplateContext,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default)]
    pub administrative: bool,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Only meaningful when `external` and `context == cluster`. Populated
    /// when the `external-rules` feature is enabled; otherwise the backing
    /// cluster role is looked up by name instead.
    #[serde(default)]
    pub external_rules: Option<Vec<PolicyRule>>,
    #[serde(default)]
    pub role_template_names: Vec<String>,
}

impl RoleTemplate {
    pub fn context(&self) -> &RoleTemplateContext {
        &self.spec.context
    }
}
