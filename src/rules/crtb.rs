//! CRTB Rule Resolver: rules a user holds in a cluster via
//! cluster-scoped role-template bindings.

use std::sync::Arc;

use k8s_openapi::api::authentication::v1::UserInfo;

use crate::cache::{self, Cache};
use crate::types::{ClusterRoleTemplateBinding, PolicyRule};

use super::accumulator::{Accumulator, JoinedError};
use super::role_template::RoleTemplateResolver;
use super::subject_index::{group_key, user_key};

pub const SUBJECT_SCOPE_INDEX: &str = "crtb-by-subject-scope";

/// Registers the subject-scope indexer on `cache`. Must be called exactly
/// once per cache instance; a second call returns
/// `cache::Error::DuplicateIndexer`.
pub async fn install_indexer(cache: &Cache<ClusterRoleTemplateBinding>) -> Result<(), cache::Error> {
    cache
        .add_indexer(SUBJECT_SCOPE_INDEX, |crtb| {
            let Some(subject) = crtb.subject() else {
                return Vec::new();
            };
            vec![super::subject_index::subject_key(&subject, &crtb.spec.cluster_name)]
        })
        .await
}

pub struct CrtbRuleResolver {
    cache: Arc<Cache<ClusterRoleTemplateBinding>>,
    role_templates: Arc<RoleTemplateResolver>,
}

impl CrtbRuleResolver {
    /// Constructs the resolver, installing the subject-scope indexer on
    /// `cache`. Panics (surfacing the underlying duplicate-indexer error) if
    /// `cache` already has one installed — this is a programmer error and
    /// the resolver must be constructed exactly once per cache.
    pub async fn new(cache: Arc<Cache<ClusterRoleTemplateBinding>>, role_templates: Arc<RoleTemplateResolver>) -> Self {
        install_indexer(&cache)
            .await
            .expect("CrtbRuleResolver must be constructed exactly once per cache");
        Self { cache, role_templates }
    }

    pub async fn rules_for(&self, user: &UserInfo, namespace: &str) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let mut acc = Accumulator::new();
        self.visit_rules_for(user, namespace, &mut acc).await;
        acc.finish()
    }

    pub async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool {
        for group in user.groups.clone().unwrap_or_default() {
            let key = group_key(&group, namespace);
            for crtb in self.cache.by_index(SUBJECT_SCOPE_INDEX, &key).await {
                self.visit_binding(&crtb, acc).await;
            }
        }

        let key = user_key(&user.username, namespace);
        for crtb in self.cache.by_index(SUBJECT_SCOPE_INDEX, &key).await {
            self.visit_binding(&crtb, acc).await;
        }

        true
    }

    async fn visit_binding(&self, crtb: &ClusterRoleTemplateBinding, acc: &mut Accumulator) {
        let (rules, err) = self
            .role_templates
            .rules_from_template_name(&crtb.spec.role_template_name)
            .await;
        acc.visit_rules(rules);
        if let Some(err) = err {
            acc.visit_error(err);
        }
    }
}
