//! GlobalRoleBinding admitter.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{extract, Json};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use crate::types::global_role::GlobalRoleSpec;
use crate::types::{GlobalRoleBinding, RoleTemplate};

use super::{check_no_escalation, responses, AppState, EscalationOutcome, UpstreamError};

const LOCAL_CLUSTER: &str = "local";

pub type Error = UpstreamError;

pub async fn validate(
    extract::State(state): extract::State<AppState>,
    Json(review): Json<AdmissionReview<GlobalRoleBinding>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, Error> {
    let req: AdmissionRequest<GlobalRoleBinding> = match review.try_into() {
        Ok(req) => req,
        Err(error) => {
            tracing::error!(%error, "invalid grb admission request");
            return Ok(Json(
                AdmissionResponse::invalid(error.to_string()).into_review(),
            ));
        }
    };

    let resp = decide(&state, &req).await?;
    if !resp.allowed {
        tracing::debug!(%req.name, ?resp.result.reason, "grb admission denied");
    }
    Ok(Json(resp.into_review()))
}

pub(crate) async fn decide(
    state: &AppState,
    req: &AdmissionRequest<GlobalRoleBinding>,
) -> Result<AdmissionResponse, Error> {
    let base: AdmissionResponse = req.into();

    if req.operation == Operation::Delete {
        return Ok(base);
    }

    let new = match &req.object {
        Some(obj) => obj,
        None => return Ok(responses::bad_request(base, "missing object")),
    };

    if req.operation == Operation::Update {
        if let Some(old) = req.old_object.as_ref() {
            if old.spec_eq(new) {
                return Ok(base);
            }
            if old.spec.user_name != new.spec.user_name {
                return Ok(responses::bad_request(base, "userName is immutable"));
            }
            if old.spec.group_principal_name != new.spec.group_principal_name {
                return Ok(responses::bad_request(base, "groupPrincipalName is immutable"));
            }
            if old.spec.global_role_name != new.spec.global_role_name {
                return Ok(responses::bad_request(base, "globalRoleName is immutable"));
            }
        }
    }

    if new.subject_group_count() != 1 {
        return Ok(responses::bad_request(base, "exactly one of userName/groupPrincipalName must be set"));
    }

    let gr = match state.global_roles.get(&new.spec.global_role_name).await {
        Some(gr) => gr,
        None => {
            if req.operation == Operation::Update && new.is_deleting() {
                return Ok(base);
            }
            return Ok(responses::not_found(base, format!("global role {:?} not found", new.spec.global_role_name)));
        }
    };

    if req.operation == Operation::Create {
        let locked = locked_templates(state, &gr.spec).await;
        if !locked.is_empty() {
            return Ok(responses::bad_request(
                base,
                format!("referenced global role inherits locked role templates: {}", locked.join(", ")),
            ));
        }
    }

    let bind_attrs = crate::sar::bind_verb_attributes(&new.spec.global_role_name);

    let (desired_cluster, desired_cluster_err) = state.global_role_resolver.cluster_rules(&gr.spec).await;
    if let Some(err) = &desired_cluster_err {
        tracing::error!(%req.name, %err, "partial failure resolving grb cluster rules");
    }
    let (held_cluster, held_cluster_err) = state
        .grb_cluster_rule_resolver
        .rules_for(&req.user_info, LOCAL_CLUSTER)
        .await;
    let cluster_outcome = check_no_escalation(
        state.access_reviewer.as_ref(),
        &req.user_info,
        &held_cluster,
        super::merge_resolve_errors(desired_cluster_err, held_cluster_err),
        &desired_cluster,
        bind_attrs.clone(),
    )
    .await;

    let desired_global = state.global_role_resolver.global_rules(&gr.spec);
    let (held_global, held_global_err) = state
        .aggregate_resolver
        .rules_for(&req.user_info, LOCAL_CLUSTER)
        .await;
    let global_outcome = check_no_escalation(
        state.access_reviewer.as_ref(),
        &req.user_info,
        &held_global,
        held_global_err,
        &desired_global,
        bind_attrs,
    )
    .await;

    for outcome in [cluster_outcome, global_outcome] {
        match outcome {
            EscalationOutcome::Allowed => {}
            EscalationOutcome::Denied(err) => return Ok(responses::failed_escalation(base, err.to_string())),
            EscalationOutcome::ResolutionFailed(err) => {
                tracing::error!(%req.name, %err, "failed to resolve requester's held rules, surfacing as upstream error");
                return Err(UpstreamError(format!("could not resolve requester's rules: {err}")));
            }
        }
    }

    Ok(base)
}

/// Walks `inheritedClusterRoles` and their transitive `roleTemplateNames`,
/// returning the names of every locked template reached. The direct-lookup
/// step is `GlobalRoleResolver::role_templates_for_role` (§4.D's primitive
/// for this exact check); the transitive walk over each result's own
/// `roleTemplateNames` is this admitter's own job per §4.J's "transitively
/// inherits".
async fn locked_templates(state: &AppState, gr: &GlobalRoleSpec) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut locked = Vec::new();
    let mut stack: Vec<Arc<RoleTemplate>> = state.global_role_resolver.role_templates_for_role(gr).await;
    while let Some(rt) = stack.pop() {
        let name = rt.metadata.name.clone().unwrap_or_default();
        if !visited.insert(name.clone()) {
            continue;
        }
        if rt.spec.locked {
            locked.push(name);
        }
        for included in &rt.spec.role_template_names {
            if let Some(child) = state.role_templates.get(included).await {
                stack.push(child);
            }
        }
    }
    locked
}
