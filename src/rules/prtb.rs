//! PRTB Rule Resolver: identical shape to the CRTB resolver; the indexer
//! derives scope from `projectName` using the `":"` split rule.

use std::sync::Arc;

use k8s_openapi::api::authentication::v1::UserInfo;

use crate::cache::{self, Cache};
use crate::types::prtb::project_namespace;
use crate::types::{PolicyRule, ProjectRoleTemplateBinding};

use super::accumulator::{Accumulator, JoinedError};
use super::role_template::RoleTemplateResolver;
use super::subject_index::{group_key, user_key};

pub const SUBJECT_SCOPE_INDEX: &str = "prtb-by-subject-scope";

pub async fn install_indexer(cache: &Cache<ProjectRoleTemplateBinding>) -> Result<(), cache::Error> {
    cache
        .add_indexer(SUBJECT_SCOPE_INDEX, |prtb| {
            let Some(subject) = prtb.subject() else {
                return Vec::new();
            };
            let Some(namespace) = project_namespace(&prtb.spec.project_name) else {
                return Vec::new();
            };
            vec![super::subject_index::subject_key(&subject, namespace)]
        })
        .await
}

pub struct PrtbRuleResolver {
    cache: Arc<Cache<ProjectRoleTemplateBinding>>,
    role_templates: Arc<RoleTemplateResolver>,
}

impl PrtbRuleResolver {
    pub async fn new(cache: Arc<Cache<ProjectRoleTemplateBinding>>, role_templates: Arc<RoleTemplateResolver>) -> Self {
        install_indexer(&cache)
            .await
            .expect("PrtbRuleResolver must be constructed exactly once per cache");
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
            for prtb in self.cache.by_index(SUBJECT_SCOPE_INDEX, &key).await {
                self.visit_binding(&prtb, acc).await;
            }
        }

        let key = user_key(&user.username, namespace);
        for prtb in self.cache.by_index(SUBJECT_SCOPE_INDEX, &key).await {
            self.visit_binding(&prtb, acc).await;
        }

        true
    }

    async fn visit_binding(&self, prtb: &ProjectRoleTemplateBinding, acc: &mut Accumulator) {
        let (rules, err) = self
            .role_templates
            .rules_from_template_name(&prtb.spec.role_template_name)
            .await;
        acc.visit_rules(rules);
        if let Some(err) = err {
            acc.visit_error(err);
        }
    }
}
