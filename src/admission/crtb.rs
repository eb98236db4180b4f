//! ClusterRoleTemplateBinding admitter.

use axum::{extract, Json};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use crate::types::role_template::RoleTemplateContext;
use crate::types::ClusterRoleTemplateBinding;

use super::{check_no_escalation, merge_resolve_errors, responses, AppState, EscalationOutcome, UpstreamError};

pub type Error = UpstreamError;

pub async fn validate(
    extract::State(state): extract::State<AppState>,
    Json(review): Json<AdmissionReview<ClusterRoleTemplateBinding>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, Error> {
    let req: AdmissionRequest<ClusterRoleTemplateBinding> = match review.try_into() {
        Ok(req) => req,
        Err(error) => {
            tracing::error!(%error, "invalid crtb admission request");
            return Ok(Json(
                AdmissionResponse::invalid(error.to_string()).into_review(),
            ));
        }
    };

    let resp = decide(&state, &req).await?;
    if resp.allowed {
        tracing::debug!(%req.name, ?req.namespace, "crtb admission allowed");
    } else {
        tracing::debug!(%req.name, ?req.namespace, ?resp.result.reason, "crtb admission denied");
    }
    Ok(Json(resp.into_review()))
}

pub(crate) async fn decide(
    state: &AppState,
    req: &AdmissionRequest<ClusterRoleTemplateBinding>,
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
        let old = req.old_object.as_ref();
        if let Some(old) = old {
            if old.spec_eq(new) && old.grb_owner() == new.grb_owner() {
                return Ok(base);
            }
            if let Some(violation) = immutability_violation(old, new) {
                return Ok(responses::bad_request(base, violation));
            }
        }
    }

    if new.subject_group_count() != 1 {
        return Ok(responses::bad_request(
            base,
            "exactly one of userName/userPrincipalName or groupName/groupPrincipalName must be set",
        ));
    }

    if new.spec.cluster_name.is_empty() || Some(new.spec.cluster_name.as_str()) != req.namespace.as_deref() {
        return Ok(responses::bad_request(base, "clusterName must be non-empty and equal the binding's namespace"));
    }
    if state.clusters.get(&new.spec.cluster_name).await.is_none() {
        return Ok(responses::not_found(base, format!("cluster {:?} not found", new.spec.cluster_name)));
    }

    if new.spec.role_template_name.is_empty() {
        return Ok(responses::bad_request(base, "roleTemplateName must be non-empty"));
    }
    // Unlike the cluster-reference lookup above, a missing role template is
    // treated as a soft failure here and admitted rather than denied — this
    // admitter's not-found policy deliberately diverges from GRB's.
    let rt = match state.role_templates.get(&new.spec.role_template_name).await {
        Some(rt) => rt,
        None => return Ok(base),
    };
    if !matches!(rt.context(), RoleTemplateContext::Cluster) {
        return Ok(responses::bad_request(base, "roleTemplateName must reference a cluster-context role template"));
    }
    if rt.spec.locked && !locked_tolerated(state, new).await {
        return Ok(responses::bad_request(base, format!("role template {:?} is locked", new.spec.role_template_name)));
    }

    let (desired, desired_err) = state.role_template_resolver.rules_from_template(&rt).await;
    if let Some(err) = &desired_err {
        tracing::error!(%req.name, %err, "partial failure resolving desired crtb rules");
    }

    let (held, held_err) = state
        .aggregate_resolver
        .rules_for(&req.user_info, &new.spec.cluster_name)
        .await;

    match check_no_escalation(
        state.access_reviewer.as_ref(),
        &req.user_info,
        &held,
        merge_resolve_errors(desired_err, held_err),
        &desired,
        crate::sar::bind_verb_attributes_role_template(&new.spec.role_template_name),
    )
    .await
    {
        EscalationOutcome::Allowed => Ok(base),
        EscalationOutcome::Denied(err) => Ok(responses::failed_escalation(base, err.to_string())),
        EscalationOutcome::ResolutionFailed(err) => {
            tracing::error!(%req.name, %err, "failed to resolve requester's held rules, surfacing as upstream error");
            Err(UpstreamError(format!("could not resolve requester's rules: {err}")))
        }
    }
}

async fn locked_tolerated(state: &AppState, crtb: &ClusterRoleTemplateBinding) -> bool {
    let Some(owner) = crtb.grb_owner() else {
        return false;
    };
    match state.grbs.get(owner).await {
        Some(grb) => !grb.is_deleting(),
        None => false,
    }
}

fn immutability_violation(old: &ClusterRoleTemplateBinding, new: &ClusterRoleTemplateBinding) -> Option<String> {
    if old.spec.cluster_name != new.spec.cluster_name {
        return Some("clusterName is immutable".to_string());
    }
    if old.spec.role_template_name != new.spec.role_template_name {
        return Some("roleTemplateName is immutable".to_string());
    }
    if old.grb_owner() != new.grb_owner() {
        return Some(format!("{} label is immutable", crate::types::crtb::GRB_OWNER_LABEL));
    }
    if !old.spec.user_name.as_deref().unwrap_or_default().is_empty()
        && old.spec.user_name != new.spec.user_name
    {
        return Some("userName is immutable once set".to_string());
    }
    if !old.spec.user_principal_name.as_deref().unwrap_or_default().is_empty()
        && old.spec.user_principal_name != new.spec.user_principal_name
    {
        return Some("userPrincipalName is immutable once set".to_string());
    }
    if !old.spec.group_name.as_deref().unwrap_or_default().is_empty()
        && old.spec.group_name != new.spec.group_name
    {
        return Some("groupName is immutable once set".to_string());
    }
    if !old.spec.group_principal_name.as_deref().unwrap_or_default().is_empty()
        && old.spec.group_principal_name != new.spec.group_principal_name
    {
        return Some("groupPrincipalName is immutable once set".to_string());
    }
    None
}
