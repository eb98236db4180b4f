//! ClusterRoleTemplateBinding: binds a subject to a role template within a
//! cluster.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::subject::{resolve_subject, subject_group_count, Subject};

/// Label carried by CRTBs created on behalf of a GlobalRoleBinding; while the
/// named GRB exists and is not being deleted, lockedness checks on the
/// referenced RoleTemplate are relaxed.
pub const GRB_OWNER_LABEL: &str = "management.cattle.io/grb-owner";

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "ClusterRoleTemplateBinding",
    shortname = "crtb",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleTemplateBindingSpec {
    pub cluster_name: String,
    pub role_template_name: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_principal_name: Option<String>,
}

impl ClusterRoleTemplateBinding {
    pub fn subject(&self) -> Option<Subject> {
        resolve_subject(
            &self.spec.user_name,
            &self.spec.user_principal_name,
            &self.spec.group_name,
            &self.spec.group_principal_name,
        )
    }

    pub fn subject_group_count(&self) -> usize {
        subject_group_count(
            &self.spec.user_name,
            &self.spec.user_principal_name,
            &self.spec.group_name,
            &self.spec.group_principal_name,
        )
    }

    pub fn grb_owner(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(GRB_OWNER_LABEL))
            .map(String::as_str)
    }

    /// Structural equality over `spec` only, used by the meta-only-change
    /// fast path on update.
    pub fn spec_eq(&self, other: &Self) -> bool {
        self.spec.cluster_name == other.spec.cluster_name
            && self.spec.role_template_name == other.spec.role_template_name
            && self.spec.user_name == other.spec.user_name
            && self.spec.user_principal_name == other.spec.user_principal_name
            && self.spec.group_name == other.spec.group_name
            && self.spec.group_principal_name == other.spec.group_principal_name
    }
}
