//! Escalation Checker: decides whether a requester's rules cover a
//! set of desired rules, using the standard Kubernetes RBAC rule-covering
//! relation.

use thiserror::Error;

use crate::types::policy_rule::WILDCARD;
use crate::types::PolicyRule;

#[derive(Debug, Error)]
#[error("attempted to grant rules not currently held by requester: {gap}")]
pub struct EscalationError {
    pub gap: String,
}

/// `Ok(())` iff every rule in `desired` is covered by some combination of
/// rules in `held` (a rule may be covered by the *union* of several held
/// rules, matching `rbac.authorization.k8s.io`'s covering semantics: each
/// field of the desired rule must be a subset of the union of that field
/// across all held rules that match on the other fields... in practice the
/// straightforward per-rule covering check — any single held rule whose
/// every field covers the desired rule's corresponding field — is what
/// upstream implements and is what this mirrors).
pub fn confirm_no_escalation(held: &[PolicyRule], desired: &[PolicyRule]) -> Result<(), EscalationError> {
    let uncovered: Vec<&PolicyRule> = desired.iter().filter(|d| !is_covered(held, d)).collect();
    if uncovered.is_empty() {
        Ok(())
    } else {
        Err(EscalationError {
            gap: uncovered
                .iter()
                .map(|r| format!("{r:?}"))
                .collect::<Vec<_>>()
                .join("; "),
        })
    }
}

fn is_covered(held: &[PolicyRule], desired: &PolicyRule) -> bool {
    held.iter().any(|h| rule_covers(h, desired))
}

/// A single held rule covers a desired rule iff each of its non-resource-URL
/// rule fields covers the corresponding desired field, or both are
/// non-resource-URL rules whose fields cover each other. A rule can't mix
/// resource and non-resource coverage: a purely non-resource held rule only
/// covers a purely non-resource desired rule, and vice versa.
fn rule_covers(held: &PolicyRule, desired: &PolicyRule) -> bool {
    let held_is_resource_rule = held.non_resource_urls.is_empty();
    let desired_is_resource_rule = desired.non_resource_urls.is_empty();

    if held_is_resource_rule != desired_is_resource_rule {
        return false;
    }

    covers_field(&held.verbs, &desired.verbs)
        && if desired_is_resource_rule {
            covers_field(&held.api_groups, &desired.api_groups)
                && covers_field(&held.resources, &desired.resources)
                && covers_resource_names(&held.resource_names, &desired.resource_names)
        } else {
            covers_non_resource_urls(&held.non_resource_urls, &desired.non_resource_urls)
        }
}

fn covers_field(held: &[String], desired: &[String]) -> bool {
    if held.iter().any(|v| v == WILDCARD) {
        return true;
    }
    desired.iter().all(|d| held.iter().any(|h| h == d))
}

/// `resourceNames` is special: an empty held list means "all names" (the
/// absence of a restriction), matching upstream RBAC semantics.
fn covers_resource_names(held: &[String], desired: &[String]) -> bool {
    if held.is_empty() {
        return true;
    }
    desired.iter().all(|d| held.iter().any(|h| h == d))
}

fn covers_non_resource_urls(held: &[String], desired: &[String]) -> bool {
    desired.iter().all(|d| {
        held.iter().any(|h| {
            if h == WILDCARD {
                true
            } else if let Some(prefix) = h.strip_suffix('*') {
                d.starts_with(prefix)
            } else {
                h == d
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rule_is_covered() {
        let r = PolicyRule::new(["get"], [""], ["pods"]);
        assert!(confirm_no_escalation(&[r.clone()], &[r]).is_ok());
    }

    #[test]
    fn wildcard_verb_covers_everything_requested() {
        let held = PolicyRule::new(["*"], [""], ["pods"]);
        let desired = PolicyRule::new(["get", "list"], [""], ["pods"]);
        assert!(confirm_no_escalation(&[held], &[desired]).is_ok());
    }

    #[test]
    fn missing_coverage_is_denied() {
        let held = PolicyRule::new(["get"], [""], ["pods"]);
        let desired = PolicyRule::new(["delete"], [""], ["pods"]);
        assert!(confirm_no_escalation(&[held], &[desired]).is_err());
    }

    #[test]
    fn resource_names_empty_on_held_means_all_names() {
        let held = PolicyRule::new(["get"], [""], ["pods"]);
        let mut desired = PolicyRule::new(["get"], [""], ["pods"]);
        desired.resource_names = vec!["specific-pod".into()];
        assert!(confirm_no_escalation(&[held], &[desired]).is_ok());
    }

    #[test]
    fn resource_rule_never_covers_non_resource_rule() {
        let held = PolicyRule::new(["*"], ["*"], ["*"]);
        let desired = PolicyRule::non_resource(["get"], ["/healthz"]);
        assert!(confirm_no_escalation(&[held], &[desired]).is_err());
    }

    #[test]
    fn non_resource_url_prefix_wildcard_covers() {
        let held = PolicyRule::non_resource(["get"], ["/healthz*"]);
        let desired = PolicyRule::non_resource(["get"], ["/healthz/ping"]);
        assert!(confirm_no_escalation(&[held], &[desired]).is_ok());
    }

    #[test]
    fn monotonicity_more_held_rules_never_revoke_coverage() {
        let held = vec![PolicyRule::new(["get"], [""], ["pods"])];
        let desired = vec![PolicyRule::new(["get"], [""], ["pods"])];
        assert!(confirm_no_escalation(&held, &desired).is_ok());

        let mut more_held = held;
        more_held.push(PolicyRule::new(["delete"], [""], ["secrets"]));
        assert!(confirm_no_escalation(&more_held, &desired).is_ok());
    }
}
