//! Role-Template Resolver: recursively flattens a role template into
//! a rule list, following inherited templates and, for external templates,
//! a backing cluster role.

use std::collections::HashSet;
use std::sync::Arc;

use k8s_openapi::api::rbac::v1::ClusterRole;

use crate::cache::Cache;
use crate::types::role_template::RoleTemplateContext;
use crate::types::{PolicyRule, RoleTemplate};

use super::accumulator::{Accumulator, JoinedError};

pub struct RoleTemplateResolver {
    templates: Arc<Cache<RoleTemplate>>,
    cluster_roles: Arc<Cache<ClusterRole>>,
    external_rules_enabled: bool,
}

impl RoleTemplateResolver {
    pub fn new(
        templates: Arc<Cache<RoleTemplate>>,
        cluster_roles: Arc<Cache<ClusterRole>>,
        external_rules_enabled: bool,
    ) -> Self {
        Self {
            templates,
            cluster_roles,
            external_rules_enabled,
        }
    }

    pub async fn rules_from_template_name(
        &self,
        name: &str,
    ) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let mut acc = Accumulator::new();
        let mut visited = HashSet::new();
        self.visit_template_name(name, &mut visited, &mut acc).await;
        acc.finish()
    }

    pub async fn rules_from_template(
        &self,
        rt: &RoleTemplate,
    ) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let mut acc = Accumulator::new();
        let mut visited = HashSet::new();
        self.visit_template(rt, &mut visited, &mut acc).await;
        acc.finish()
    }

    async fn visit_template_name(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        acc: &mut Accumulator,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        match self.templates.get(name).await {
            Some(rt) => self.visit_template_body(&rt, visited, acc).await,
            None => {
                acc.visit_error(format!("role template {name:?} not found"));
            }
        }
    }

    async fn visit_template(
        &self,
        rt: &RoleTemplate,
        visited: &mut HashSet<String>,
        acc: &mut Accumulator,
    ) {
        let name = rt.metadata.name.clone().unwrap_or_default();
        if !visited.insert(name) {
            return;
        }
        self.visit_template_body(rt, visited, acc).await;
    }

    async fn visit_template_body(
        &self,
        rt: &RoleTemplate,
        visited: &mut HashSet<String>,
        acc: &mut Accumulator,
    ) {
        acc.visit_rules(rt.spec.rules.clone());

        if rt.spec.external && matches!(rt.spec.context, RoleTemplateContext::Cluster) {
            if self.external_rules_enabled {
                if let Some(external) = &rt.spec.external_rules {
                    acc.visit_rules(external.clone());
                } else {
                    self.visit_backing_cluster_role(rt, acc).await;
                }
            } else {
                self.visit_backing_cluster_role(rt, acc).await;
            }
        }

        for name in &rt.spec.role_template_names {
            let name = name.clone();
            Box::pin(self.visit_template_name(&name, visited, acc)).await;
        }
    }

    async fn visit_backing_cluster_role(&self, rt: &RoleTemplate, acc: &mut Accumulator) {
        let name = rt.metadata.name.clone().unwrap_or_default();
        match self.cluster_roles.get(&name).await {
            Some(cr) => {
                let rules = cr.rules.clone().unwrap_or_default();
                acc.visit_rules(rules.into_iter().map(PolicyRule::from));
            }
            None => {
                acc.visit_error(format!("backing cluster role {name:?} not found"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::role_template::RoleTemplateSpec;
    use kube::core::ObjectMeta;

    fn rt(name: &str, rules: Vec<PolicyRule>, includes: Vec<&str>) -> RoleTemplate {
        RoleTemplate {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: RoleTemplateSpec {
                context: RoleTemplateContext::Cluster,
                locked: false,
                external: false,
                builtin: false,
                administrative: false,
                rules,
                external_rules: None,
                role_template_names: includes.into_iter().map(String::from).collect(),
            },
        }
    }

    async fn resolver_with(templates: Vec<RoleTemplate>) -> RoleTemplateResolver {
        let cache = Arc::new(Cache::new());
        for t in templates {
            cache.put(t.metadata.name.clone().unwrap(), t).await;
        }
        RoleTemplateResolver::new(cache, Arc::new(Cache::new()), true)
    }

    #[tokio::test]
    async fn flattens_included_templates() {
        let base = rt("base", vec![PolicyRule::new(["get"], [""], ["pods"])], vec![]);
        let top = rt(
            "top",
            vec![PolicyRule::new(["list"], [""], ["pods"])],
            vec!["base"],
        );
        let resolver = resolver_with(vec![base, top.clone()]).await;
        let (rules, err) = resolver.rules_from_template(&top).await;
        assert!(err.is_none());
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn cyclic_inclusion_terminates_and_visits_once() {
        let a = rt("a", vec![PolicyRule::new(["get"], [""], ["pods"])], vec!["b"]);
        let b = rt("b", vec![PolicyRule::new(["list"], [""], ["pods"])], vec!["a"]);
        let resolver = resolver_with(vec![a.clone(), b]).await;
        let (rules, err) = resolver.rules_from_template(&a).await;
        assert!(err.is_none());
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn missing_included_template_surfaces_error_but_keeps_partial_rules() {
        let a = rt(
            "a",
            vec![PolicyRule::new(["get"], [""], ["pods"])],
            vec!["missing"],
        );
        let resolver = resolver_with(vec![a.clone()]).await;
        let (rules, err) = resolver.rules_from_template(&a).await;
        assert_eq!(rules.len(), 1);
        assert!(err.is_some());
    }

    #[tokio::test]
    async fn missing_template_name_surfaces_error() {
        let resolver = resolver_with(vec![]).await;
        let (rules, err) = resolver.rules_from_template_name("nope").await;
        assert!(rules.is_empty());
        assert!(err.is_some());
    }
}
