//! GRB Cluster-Rule Resolver: three projections of a global role,
//! reached via GlobalRoleBindings, sharing one visitor; plus the
//! privileged-service-account synthetic-admin path.

use std::sync::Arc;

use k8s_openapi::api::authentication::v1::UserInfo;

use crate::cache::{self, Cache};
use crate::sar::{admin_check_attributes, AccessReviewer};
use crate::types::policy_rule::admin_rules;
use crate::types::{GlobalRole, GlobalRoleBinding, PolicyRule};

use super::accumulator::{Accumulator, JoinedError};
use super::global_role::GlobalRoleResolver;
use super::subject_index::{group_key, user_key};

pub const SUBJECT_INDEX: &str = "grb-by-subject";

/// Service accounts treated as privileged when acting through the
/// "all service accounts" group.
const PRIVILEGED_SERVICE_ACCOUNT_NAMES: &[&str] = &["rancher-backup", "fleet-agent"];
const ALL_SERVICE_ACCOUNTS_GROUP: &str = "system:serviceaccounts";
const LOCAL_CLUSTER: &str = "local";

pub async fn install_indexer(cache: &Cache<GlobalRoleBinding>) -> Result<(), cache::Error> {
    cache
        .add_indexer(SUBJECT_INDEX, |grb| {
            let Some(subject) = grb.subject() else {
                return Vec::new();
            };
            // GRBs are scoped globally: scope is always "".
            vec![super::subject_index::subject_key(&subject, "")]
        })
        .await
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    InheritedClusterRules,
    FleetResourceRules,
    FleetWorkspaceVerbs,
}

/// Parses `system:serviceaccount:<namespace>:<name>`, returning the bare
/// account name.
fn parse_service_account_name(username: &str) -> Option<&str> {
    let rest = username.strip_prefix("system:serviceaccount:")?;
    let (_, name) = rest.split_once(':')?;
    Some(name)
}

pub struct GrbClusterRuleResolver {
    grbs: Arc<Cache<GlobalRoleBinding>>,
    global_roles: Arc<Cache<GlobalRole>>,
    global_role_resolver: Arc<GlobalRoleResolver>,
    access_reviewer: Arc<dyn AccessReviewer>,
    variant: Variant,
}

impl GrbClusterRuleResolver {
    pub async fn new(
        grbs: Arc<Cache<GlobalRoleBinding>>,
        global_roles: Arc<Cache<GlobalRole>>,
        global_role_resolver: Arc<GlobalRoleResolver>,
        access_reviewer: Arc<dyn AccessReviewer>,
        variant: Variant,
    ) -> Self {
        // Each of the three variants may be constructed against the same
        // GRB cache; only the first installs the indexer successfully, so
        // callers share one `Cache<GlobalRoleBinding>` across all three and
        // install the indexer once up front via `install_indexer` before
        // constructing any variant. See `rules::aggregate` wiring.
        Self {
            grbs,
            global_roles,
            global_role_resolver,
            access_reviewer,
            variant,
        }
    }

    pub async fn rules_for(&self, user: &UserInfo, namespace: &str) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let mut acc = Accumulator::new();
        self.visit_rules_for(user, namespace, &mut acc).await;
        acc.finish()
    }

    pub async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool {
        let mut keys = vec![user_key(&user.username, "")];
        keys.extend(user.groups.clone().unwrap_or_default().iter().map(|g| group_key(g, "")));

        for key in keys {
            for grb in self.grbs.by_index(SUBJECT_INDEX, &key).await {
                self.visit_binding(&grb, namespace, acc).await;
            }
        }

        if self.variant == Variant::InheritedClusterRules {
            self.visit_privileged_service_account(user, acc).await;
        }

        true
    }

    async fn visit_binding(&self, grb: &GlobalRoleBinding, namespace: &str, acc: &mut Accumulator) {
        let Some(gr) = self.global_roles.get(&grb.spec.global_role_name).await else {
            acc.visit_error(format!("global role {:?} not found", grb.spec.global_role_name));
            return;
        };

        match self.variant {
            Variant::InheritedClusterRules => {
                if namespace == LOCAL_CLUSTER {
                    acc.visit_rules(self.global_role_resolver.global_rules(&gr.spec));
                } else {
                    let (rules, err) = self.global_role_resolver.cluster_rules(&gr.spec).await;
                    acc.visit_rules(rules);
                    if let Some(err) = err {
                        acc.visit_error(err);
                    }
                }
            }
            Variant::FleetResourceRules => {
                acc.visit_rules(self.global_role_resolver.fleet_resource_rules(&gr.spec));
            }
            Variant::FleetWorkspaceVerbs => {
                acc.visit_rules(self.global_role_resolver.fleet_workspace_verbs(&gr.spec));
            }
        }
    }

    async fn visit_privileged_service_account(&self, user: &UserInfo, acc: &mut Accumulator) {
        let Some(sa_name) = parse_service_account_name(&user.username) else {
            return;
        };
        if !PRIVILEGED_SERVICE_ACCOUNT_NAMES.contains(&sa_name) {
            return;
        }
        let is_all_service_accounts = user
            .groups
            .as_ref()
            .is_some_and(|groups| groups.iter().any(|g| g == ALL_SERVICE_ACCOUNTS_GROUP));
        if !is_all_service_accounts {
            return;
        }

        match self.access_reviewer.allowed(user, admin_check_attributes()).await {
            Ok(true) => acc.visit_rules(admin_rules()),
            Ok(false) => {}
            Err(err) => acc.visit_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::global_role::GlobalRoleResolver;
    use crate::rules::role_template::RoleTemplateResolver;
    use crate::sar::test_support::StubAccessReviewer;
    use crate::types::global_role::GlobalRoleSpec;
    use crate::types::grb::GlobalRoleBindingSpec;
    use crate::types::RoleTemplate;
    use k8s_openapi::api::rbac::v1::ClusterRole;
    use kube::core::ObjectMeta;

    fn user_info(username: &str, groups: Vec<&str>) -> UserInfo {
        UserInfo {
            username: username.to_string(),
            uid: None,
            groups: Some(groups.into_iter().map(String::from).collect()),
            extra: None,
        }
    }

    async fn resolver(
        grbs: Vec<GlobalRoleBinding>,
        global_roles: Vec<GlobalRole>,
        reviewer: Arc<StubAccessReviewer>,
        variant: Variant,
    ) -> GrbClusterRuleResolver {
        let grb_cache = Arc::new(Cache::new());
        install_indexer(&grb_cache).await.unwrap();
        for g in grbs {
            grb_cache.put(g.metadata.name.clone().unwrap(), g).await;
        }
        let gr_cache: Arc<Cache<GlobalRole>> = Arc::new(Cache::new());
        for gr in global_roles {
            gr_cache.put(gr.metadata.name.clone().unwrap(), gr).await;
        }
        let rt_cache: Arc<Cache<RoleTemplate>> = Arc::new(Cache::new());
        let cr_cache: Arc<Cache<ClusterRole>> = Arc::new(Cache::new());
        let rt_resolver = Arc::new(RoleTemplateResolver::new(rt_cache.clone(), cr_cache, true));
        let gr_resolver = Arc::new(GlobalRoleResolver::new(rt_resolver, rt_cache));
        GrbClusterRuleResolver::new(grb_cache, gr_cache, gr_resolver, reviewer, variant).await
    }

    #[tokio::test]
    async fn privileged_service_account_synthesizes_admin_rules_with_no_grbs() {
        let reviewer = Arc::new(StubAccessReviewer::new());
        reviewer.stub(&admin_check_attributes(), true);
        let r = resolver(vec![], vec![], reviewer, Variant::InheritedClusterRules).await;
        let user = user_info(
            "system:serviceaccount:cattle-resources-system:rancher-backup",
            vec!["system:serviceaccounts"],
        );
        let (rules, err) = r.rules_for(&user, "c1").await;
        assert!(err.is_none());
        assert_eq!(rules, admin_rules());
    }

    #[tokio::test]
    async fn non_privileged_service_account_gets_nothing() {
        let reviewer = Arc::new(StubAccessReviewer::new());
        let r = resolver(vec![], vec![], reviewer, Variant::InheritedClusterRules).await;
        let user = user_info(
            "system:serviceaccount:default:some-other-sa",
            vec!["system:serviceaccounts"],
        );
        let (rules, err) = r.rules_for(&user, "c1").await;
        assert!(err.is_none());
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn local_cluster_uses_global_rules_not_cluster_rules() {
        let gr = GlobalRole {
            metadata: ObjectMeta {
                name: Some("gr1".into()),
                ..Default::default()
            },
            spec: GlobalRoleSpec {
                rules: vec![PolicyRule::new(["get"], [""], ["pods"])],
                namespaced_rules: Default::default(),
                inherited_cluster_roles: vec!["missing-template".into()],
                inherited_fleet_workspace_permissions: None,
            },
        };
        let grb = GlobalRoleBinding {
            metadata: ObjectMeta {
                name: Some("grb1".into()),
                ..Default::default()
            },
            spec: GlobalRoleBindingSpec {
                global_role_name: "gr1".into(),
                user_name: Some("alice".into()),
                group_principal_name: None,
            },
        };
        let reviewer = Arc::new(StubAccessReviewer::new());
        let r = resolver(vec![grb], vec![gr], reviewer, Variant::InheritedClusterRules).await;
        let user = user_info("alice", vec![]);

        let (rules, err) = r.rules_for(&user, "local").await;
        assert!(err.is_none());
        assert_eq!(rules.len(), 1);
    }
}
