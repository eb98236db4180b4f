//! Global-Role Resolver: four projections of a global role's rules.

use std::sync::Arc;

use crate::types::global_role::GlobalRoleSpec;
use crate::types::{GlobalRole, PolicyRule, RoleTemplate};

use super::accumulator::JoinedError;
use super::role_template::RoleTemplateResolver;

pub struct GlobalRoleResolver {
    role_templates: Arc<RoleTemplateResolver>,
    template_cache: Arc<crate::cache::Cache<RoleTemplate>>,
}

impl GlobalRoleResolver {
    pub fn new(
        role_templates: Arc<RoleTemplateResolver>,
        template_cache: Arc<crate::cache::Cache<RoleTemplate>>,
    ) -> Self {
        Self {
            role_templates,
            template_cache,
        }
    }

    pub fn global_rules(&self, gr: &GlobalRoleSpec) -> Vec<PolicyRule> {
        gr.rules.clone()
    }

    /// Flattened rules of every template listed in `inheritedClusterRoles`.
    pub async fn cluster_rules(&self, gr: &GlobalRoleSpec) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let mut rules = Vec::new();
        let mut errors = Vec::new();
        for name in &gr.inherited_cluster_roles {
            let (r, err) = self.role_templates.rules_from_template_name(name).await;
            rules.extend(r);
            if let Some(err) = err {
                errors.push(err.to_string());
            }
        }
        let err = if errors.is_empty() {
            None
        } else {
            Some(super::accumulator::JoinedError::from_strings(errors))
        };
        (rules, err)
    }

    pub fn fleet_resource_rules(&self, gr: &GlobalRoleSpec) -> Vec<PolicyRule> {
        gr.inherited_fleet_workspace_permissions
            .as_ref()
            .map(|p| p.resource_rules.clone())
            .unwrap_or_default()
    }

    /// Rules derived from `inheritedFleetWorkspacePermissions.workspaceVerbs`:
    /// one synthetic rule granting those verbs on fleet workspace resources.
    pub fn fleet_workspace_verbs(&self, gr: &GlobalRoleSpec) -> Vec<PolicyRule> {
        match &gr.inherited_fleet_workspace_permissions {
            Some(p) if !p.workspace_verbs.is_empty() => vec![PolicyRule::new(
                p.workspace_verbs.clone(),
                ["management.cattle.io"],
                ["fleetworkspaces"],
            )],
            _ => Vec::new(),
        }
    }

    /// The RoleTemplates named in `inheritedClusterRoles`, for the
    /// locked-template check's GRB create invariant.
    pub async fn role_templates_for_role(&self, gr: &GlobalRoleSpec) -> Vec<Arc<RoleTemplate>> {
        let mut out = Vec::new();
        for name in &gr.inherited_cluster_roles {
            if let Some(rt) = self.template_cache.get(name).await {
                out.push(rt);
            }
        }
        out
    }
}
