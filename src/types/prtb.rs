//! ProjectRoleTemplateBinding: identical shape to CRTB, scoped to a project
//! named `"<cluster>:<project>"`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::crtb::GRB_OWNER_LABEL;
use super::subject::{resolve_subject, subject_group_count, Subject};

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "ProjectRoleTemplateBinding",
    shortname = "prtb",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRoleTemplateBindingSpec {
    /// `"<cluster>:<project>"`.
    pub project_name: String,
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

impl ProjectRoleTemplateBinding {
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

    /// Effective namespace: the substring after the sole `:` in
    /// `projectName`. `None` if `projectName` does not contain exactly one
    /// `:`.
    pub fn namespace(&self) -> Option<&str> {
        project_namespace(&self.spec.project_name)
    }

    pub fn cluster_name(&self) -> Option<&str> {
        project_cluster(&self.spec.project_name)
    }

    /// Structural equality over `spec` only, used by the meta-only-change
    /// fast path on update.
    pub fn spec_eq(&self, other: &Self) -> bool {
        self.spec.project_name == other.spec.project_name
            && self.spec.role_template_name == other.spec.role_template_name
            && self.spec.user_name == other.spec.user_name
            && self.spec.user_principal_name == other.spec.user_principal_name
            && self.spec.group_name == other.spec.group_name
            && self.spec.group_principal_name == other.spec.group_principal_name
    }
}

/// Splits `"<cluster>:<project>"` into the namespace half, requiring exactly
/// one `:` separator.
pub fn project_namespace(project_name: &str) -> Option<&str> {
    let mut parts = project_name.split(':');
    let _cluster = parts.next()?;
    let project = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(project)
}

/// Splits `"<cluster>:<project>"` into the cluster half, requiring exactly
/// one `:` separator.
pub fn project_cluster(project_name: &str) -> Option<&str> {
    let mut parts = project_name.split(':');
    let cluster = parts.next()?;
    let _project = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_cluster_and_project() {
        assert_eq!(project_namespace("c1:p1"), Some("p1"));
        assert_eq!(project_cluster("c1:p1"), Some("c1"));
    }

    #[test]
    fn rejects_malformed_project_name() {
        assert_eq!(project_namespace("c1"), None);
        assert_eq!(project_namespace("c1:p1:extra"), None);
        assert_eq!(project_namespace(""), None);
    }
}
