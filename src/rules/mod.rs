//! The rule-resolution engine: computes the effective set of
//! policy rules a requester holds in a given scope.

pub mod accumulator;
pub mod aggregate;
pub mod crtb;
pub mod escalation;
pub mod global_role;
pub mod grb;
pub mod prtb;
pub mod role_template;
pub mod subject_index;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::UserInfo;

use self::accumulator::Accumulator;

/// Common shape shared by every scope-specific rule resolver,
/// so the Aggregate Resolver can drive them uniformly.
#[async_trait]
pub trait RuleVisitor: Send + Sync {
    /// Visits the rules this resolver contributes for `user` in `namespace`,
    /// threading `acc` so errors from one resolver never stop another from
    /// contributing.
    async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool;
}

#[async_trait]
impl RuleVisitor for crtb::CrtbRuleResolver {
    async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool {
        crtb::CrtbRuleResolver::visit_rules_for(self, user, namespace, acc).await
    }
}

#[async_trait]
impl RuleVisitor for prtb::PrtbRuleResolver {
    async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool {
        prtb::PrtbRuleResolver::visit_rules_for(self, user, namespace, acc).await
    }
}

#[async_trait]
impl RuleVisitor for grb::GrbClusterRuleResolver {
    async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool {
        grb::GrbClusterRuleResolver::visit_rules_for(self, user, namespace, acc).await
    }
}
