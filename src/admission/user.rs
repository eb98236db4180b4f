//! User admitter.

use axum::{extract, Json};
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::authorization::v1::ResourceAttributes;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;

use crate::rules::escalation::confirm_no_escalation;
use crate::types::User;

use super::{responses, AppState, UpstreamError};

const LOCAL_CLUSTER: &str = "local";

pub type Error = UpstreamError;

fn manage_users_attributes() -> ResourceAttributes {
    ResourceAttributes {
        group: Some("management.cattle.io".to_string()),
        version: Some("v3".to_string()),
        resource: Some("users".to_string()),
        verb: Some("manage-users".to_string()),
        ..Default::default()
    }
}

pub async fn validate(
    extract::State(state): extract::State<AppState>,
    Json(review): Json<AdmissionReview<User>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, Error> {
    let req: AdmissionRequest<User> = match review.try_into() {
        Ok(req) => req,
        Err(error) => {
            tracing::error!(%error, "invalid user admission request");
            return Ok(Json(
                AdmissionResponse::invalid(error.to_string()).into_review(),
            ));
        }
    };

    let resp = decide(&state, &req).await?;
    if !resp.allowed {
        tracing::debug!(%req.name, ?resp.result.reason, "user admission denied");
    }
    Ok(Json(resp.into_review()))
}

pub(crate) async fn decide(state: &AppState, req: &AdmissionRequest<User>) -> Result<AdmissionResponse, Error> {
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
            if !old.spec.username.is_empty() && old.spec.username != new.spec.username {
                return Ok(responses::bad_request(base, "username is immutable once set"));
            }
        }
    }

    if req.operation == Operation::Create {
        let duplicate = state
            .users
            .list()
            .await
            .iter()
            .any(|u| u.spec.username == new.spec.username);
        if duplicate {
            return Ok(responses::bad_request(base, format!("username {:?} already in use", new.spec.username)));
        }
    }

    match state.access_reviewer.allowed(&req.user_info, manage_users_attributes()).await {
        Ok(true) => return Ok(base),
        Ok(false) => {}
        Err(err) => {
            tracing::error!(%req.name, %err, "manage-users access review failed, surfacing as upstream error");
            return Err(UpstreamError(format!("access review failed: {err}")));
        }
    }

    let target_groups = state
        .user_attributes
        .get(&new.spec.username)
        .await
        .map(|ua| ua.spec.group_principals.clone())
        .unwrap_or_default();
    let target = UserInfo {
        username: new.spec.username.clone(),
        uid: None,
        groups: Some(target_groups),
        extra: None,
    };

    let (target_rules, target_err) = state.aggregate_resolver.rules_for(&target, LOCAL_CLUSTER).await;
    let (held, held_err) = state.aggregate_resolver.rules_for(&req.user_info, LOCAL_CLUSTER).await;

    match confirm_no_escalation(&held, &target_rules) {
        Ok(()) => match target_err.or(held_err) {
            Some(err) => {
                tracing::error!(%req.name, %err, "failed to resolve rules, surfacing as upstream error");
                Err(UpstreamError(format!("could not resolve rules: {err}")))
            }
            None => Ok(base),
        },
        Err(err) => Ok(responses::failed_escalation(base, err.to_string())),
    }
}
