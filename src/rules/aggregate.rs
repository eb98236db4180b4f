//! Aggregate Resolver: visits an ordered list of resolvers and
//! concatenates their results. Order matters only for diagnostic ordering —
//! the final rule set is insensitive to it.

use std::sync::Arc;

use k8s_openapi::api::authentication::v1::UserInfo;

use crate::types::PolicyRule;

use super::accumulator::{Accumulator, JoinedError};
use super::RuleVisitor;

pub struct AggregateResolver {
    resolvers: Vec<Arc<dyn RuleVisitor>>,
}

impl AggregateResolver {
    pub fn new(resolvers: Vec<Arc<dyn RuleVisitor>>) -> Self {
        Self { resolvers }
    }

    pub async fn visit_rules_for(&self, user: &UserInfo, namespace: &str, acc: &mut Accumulator) -> bool {
        for resolver in &self.resolvers {
            resolver.visit_rules_for(user, namespace, acc).await;
        }
        true
    }

    /// Drives visitation with a local accumulator and returns the
    /// concatenated `(rules, err)` pair — a sub-resolver's failure never
    /// stops the others from contributing.
    pub async fn rules_for(&self, user: &UserInfo, namespace: &str) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let mut acc = Accumulator::new();
        self.visit_rules_for(user, namespace, &mut acc).await;
        acc.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedResolver {
        rules: Vec<PolicyRule>,
        error: Option<&'static str>,
    }

    #[async_trait]
    impl RuleVisitor for FixedResolver {
        async fn visit_rules_for(&self, _user: &UserInfo, _namespace: &str, acc: &mut Accumulator) -> bool {
            acc.visit_rules(self.rules.clone());
            if let Some(e) = self.error {
                acc.visit_error(e);
            }
            true
        }
    }

    fn user() -> UserInfo {
        UserInfo {
            username: "alice".into(),
            uid: None,
            groups: None,
            extra: None,
        }
    }

    #[tokio::test]
    async fn concatenates_rules_and_joins_errors_from_every_resolver() {
        let a = Arc::new(FixedResolver {
            rules: vec![PolicyRule::new(["get"], [""], ["pods"])],
            error: Some("a failed"),
        });
        let b = Arc::new(FixedResolver {
            rules: vec![PolicyRule::new(["list"], [""], ["pods"])],
            error: None,
        });
        let agg = AggregateResolver::new(vec![a, b]);
        let (rules, err) = agg.rules_for(&user(), "c1").await;
        assert_eq!(rules.len(), 2);
        assert_eq!(err.unwrap().to_string(), "a failed");
    }

    #[tokio::test]
    async fn one_resolver_erroring_does_not_stop_others() {
        let a = Arc::new(FixedResolver {
            rules: vec![],
            error: Some("boom"),
        });
        let b = Arc::new(FixedResolver {
            rules: vec![PolicyRule::new(["list"], [""], ["pods"])],
            error: None,
        });
        let agg = AggregateResolver::new(vec![a, b]);
        let (rules, err) = agg.rules_for(&user(), "c1").await;
        assert_eq!(rules.len(), 1);
        assert!(err.is_some());
    }
}
