//! GlobalRoleBinding: binds a subject to a GlobalRole.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::subject::{resolve_subject, subject_group_count, Subject};

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "GlobalRoleBinding",
    shortname = "grb"
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRoleBindingSpec {
    pub global_role_name: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub group_principal_name: Option<String>,
}

impl GlobalRoleBinding {
    /// GRBs only ever carry `userName` or `groupPrincipalName`.
    pub fn subject(&self) -> Option<Subject> {
        resolve_subject(&self.spec.user_name, &None, &None, &self.spec.group_principal_name)
    }

    pub fn subject_group_count(&self) -> usize {
        subject_group_count(&self.spec.user_name, &None, &None, &self.spec.group_principal_name)
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Structural equality over every field but `ObjectMeta`, used by the
    /// GRB validator's meta-only-change fast path.
    pub fn spec_eq(&self, other: &Self) -> bool {
        self.spec.global_role_name == other.spec.global_role_name
            && self.spec.user_name == other.spec.user_name
            && self.spec.group_principal_name == other.spec.group_principal_name
    }
}
