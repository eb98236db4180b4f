//! Admission dispatch: per-resource-kind sub-admitters sharing one
//! `AppState` and one escalation-check flow.

pub mod crtb;
pub mod grb;
pub mod grb_mutate;
pub mod labeled_rbac;
pub mod prtb;
pub mod responses;
pub mod user;

use std::sync::Arc;

use axum::{routing, Router};
use http::StatusCode;
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::rbac::v1::ClusterRole;

use crate::cache::Cache;
use crate::rules::aggregate::AggregateResolver;
use crate::rules::crtb::CrtbRuleResolver;
use crate::rules::escalation::{confirm_no_escalation, EscalationError};
use crate::rules::global_role::GlobalRoleResolver;
use crate::rules::grb::GrbClusterRuleResolver;
use crate::rules::prtb::PrtbRuleResolver;
use crate::rules::role_template::RoleTemplateResolver;
use crate::sar::AccessReviewer;
use k8s_openapi::api::authorization::v1::ResourceAttributes;
use crate::types::{
    Cluster, ClusterRoleTemplateBinding, GlobalRole, GlobalRoleBinding, ProjectRoleTemplateBinding,
    RoleTemplate, User, UserAttribute,
};

/// Shared dependencies handed to every admitter. Constructed once at
/// startup and cloned cheaply (every field is an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub access_reviewer: Arc<dyn AccessReviewer>,

    pub clusters: Arc<Cache<Cluster>>,
    pub role_templates: Arc<Cache<RoleTemplate>>,
    pub cluster_roles: Arc<Cache<ClusterRole>>,
    pub global_roles: Arc<Cache<GlobalRole>>,
    pub crtbs: Arc<Cache<ClusterRoleTemplateBinding>>,
    pub prtbs: Arc<Cache<ProjectRoleTemplateBinding>>,
    pub grbs: Arc<Cache<GlobalRoleBinding>>,
    pub users: Arc<Cache<User>>,
    pub user_attributes: Arc<Cache<UserAttribute>>,

    pub role_template_resolver: Arc<RoleTemplateResolver>,
    pub global_role_resolver: Arc<GlobalRoleResolver>,
    pub crtb_rule_resolver: Arc<CrtbRuleResolver>,
    pub prtb_rule_resolver: Arc<PrtbRuleResolver>,
    pub grb_cluster_rule_resolver: Arc<GrbClusterRuleResolver>,
    /// CRTB + PRTB + GRB(InheritedClusterRules), the "default" rule
    /// resolver a requester's held rules are computed against for every
    /// binding admitter but the GRB cluster-rules check, which goes
    /// through `grb_cluster_rule_resolver` alone.
    pub aggregate_resolver: Arc<AggregateResolver>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/validate/clusterroletemplatebindings", routing::post(crtb::validate))
        .route("/validate/projectroletemplatebindings", routing::post(prtb::validate))
        .route("/validate/globalrolebindings", routing::post(grb::validate))
        .route("/mutate/globalrolebindings", routing::post(grb_mutate::mutate))
        .route("/validate/users", routing::post(user::validate))
        .route("/validate/clusterroles", routing::post(labeled_rbac::validate_cluster_role))
        .route(
            "/validate/clusterrolebindings",
            routing::post(labeled_rbac::validate_cluster_role_binding),
        )
        .route("/validate/roles", routing::post(labeled_rbac::validate_role))
        .route("/validate/rolebindings", routing::post(labeled_rbac::validate_role_binding))
        .route("/ping", routing::get(ping))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn ping() -> &'static str {
    "ok"
}

/// A decision-unrelated failure: a resolver hit an error gathering the
/// requester's held rules, or a subject-access-review call itself failed.
/// This must reach the API server as a retryable
/// transport error (HTTP 500), never as an explicit `allowed:false`
/// decision — the coverage check may well have passed, and denying outright
/// would reject requests a complete rule set would have allowed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UpstreamError(pub String);

impl axum::response::IntoResponse for UpstreamError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0).into_response()
    }
}

/// Merges a resolver error from the *desired*-rules side (§4.C/§4.D's
/// partial `(rules, err)` result) with one from the *held*-rules side into
/// the single `held_resolve_err` slot `check_no_escalation` surfaces as an
/// `UpstreamError` when the coverage check would otherwise have allowed. An
/// under-resolved desired set can make an incomplete grant look fully
/// covered, so it gets exactly the same "don't silently allow" treatment as
/// an under-resolved held set.
pub fn merge_resolve_errors(
    desired_err: Option<impl ToString>,
    held_err: Option<impl ToString>,
) -> Option<String> {
    match (desired_err.map(|e| e.to_string()), held_err.map(|e| e.to_string())) {
        (None, None) => None,
        (Some(d), None) => Some(d),
        (None, Some(h)) => Some(h),
        (Some(d), Some(h)) => Some(format!("{d}; {h}")),
    }
}

/// Outcome of the shared no-escalation check, folding in the
/// `bind`-verb bypass and the partial-resolution-failure handling.
pub enum EscalationOutcome {
    Allowed,
    Denied(EscalationError),
    /// The coverage check passed, but rule resolution for the requester's
    /// held rules hit an error along the way. Callers must surface this as
    /// an `UpstreamError`, not as a denial ("never denies solely
    /// because a single lookup failed if the partial rules already cover
    /// the desired rules").
    ResolutionFailed(String),
}

/// Runs `confirm_no_escalation(held, desired)`. On failure, attempts the
/// `bind`-verb bypass against `bind_global_role_name` before denying. On
/// success, a resolver error gathering `held` is still surfaced rather
/// than silently allowed — but a resolver error that didn't change
/// the outcome (coverage already failed) is folded into the plain denial.
/// A transport failure from the `bind`-verb subject-access-review itself
/// (timeout, `kube::Error`, missing status) is never folded into the
/// denial either — it is decision-unrelated network I/O per §7 item 5 and
/// must reach the caller as an `UpstreamError`, not as an explicit
/// `allowed:false`.
pub async fn check_no_escalation(
    access_reviewer: &dyn AccessReviewer,
    user: &UserInfo,
    held: &[crate::types::PolicyRule],
    held_resolve_err: Option<impl ToString>,
    desired: &[crate::types::PolicyRule],
    bind_check: ResourceAttributes,
) -> EscalationOutcome {
    match confirm_no_escalation(held, desired) {
        Ok(()) => match held_resolve_err {
            Some(err) => EscalationOutcome::ResolutionFailed(err.to_string()),
            None => EscalationOutcome::Allowed,
        },
        Err(escalation_err) => match access_reviewer.allowed(user, bind_check).await {
            Ok(true) => EscalationOutcome::Allowed,
            Ok(false) => EscalationOutcome::Denied(escalation_err),
            Err(err) => EscalationOutcome::ResolutionFailed(format!(
                "bind-verb access review failed: {err}"
            )),
        },
    }
}
