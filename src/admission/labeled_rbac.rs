//! ClusterRole / ClusterRoleBinding / Role / RoleBinding admitters.
//! The webhook only ever receives objects carrying the `gr-owner` or
//! `grb-owner` label (enforced by the object-label selector); the
//! sole enforcement here is that the label, once present, is never
//! changed or removed.

use axum::{response, Json};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::responses;

const OWNER_LABELS: [&str; 2] = ["management.cattle.io/gr-owner", "management.cattle.io/grb-owner"];

#[derive(Debug)]
pub enum Error {}

impl response::IntoResponse for Error {
    fn into_response(self) -> response::Response {
        match self {}
    }
}

fn label_violation<T: Resource>(old: &T, new: &T) -> Option<String> {
    for label in OWNER_LABELS {
        let old_value = old.meta().labels.as_ref().and_then(|l| l.get(label));
        if old_value.is_some() {
            let new_value = new.meta().labels.as_ref().and_then(|l| l.get(label));
            if old_value != new_value {
                return Some(format!("{label} label is immutable once set"));
            }
        }
    }
    None
}

async fn decide<T>(req: &AdmissionRequest<T>) -> AdmissionResponse
where
    T: Clone + Serialize + DeserializeOwned + Resource<DynamicType = ()>,
{
    let base: AdmissionResponse = req.into();

    if req.operation == Operation::Delete {
        return base;
    }

    let Some(new) = &req.object else {
        return responses::bad_request(base, "missing object");
    };

    if req.operation == Operation::Update {
        if let Some(old) = req.old_object.as_ref() {
            if let Some(violation) = label_violation(old, new) {
                return responses::bad_request(base, violation);
            }
        }
    }

    base
}

macro_rules! labeled_admitter {
    ($fn_name:ident, $kind:ty) => {
        pub async fn $fn_name(
            Json(review): Json<AdmissionReview<$kind>>,
        ) -> Result<Json<AdmissionReview<DynamicObject>>, Error> {
            let req: AdmissionRequest<$kind> = match review.try_into() {
                Ok(req) => req,
                Err(error) => {
                    tracing::error!(%error, "invalid admission request");
                    return Ok(Json(
                        AdmissionResponse::invalid(error.to_string()).into_review(),
                    ));
                }
            };
            Ok(Json(decide(&req).await.into_review()))
        }
    };
}

labeled_admitter!(validate_cluster_role, ClusterRole);
labeled_admitter!(validate_cluster_role_binding, ClusterRoleBinding);
labeled_admitter!(validate_role, Role);
labeled_admitter!(validate_role_binding, RoleBinding);

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kube::core::ObjectMeta;

    use super::*;

    fn cluster_role(name: &str, labels: &[(&str, &str)]) -> ClusterRole {
        let mut map = BTreeMap::new();
        for (k, v) in labels {
            map.insert(k.to_string(), v.to_string());
        }
        ClusterRole {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: if map.is_empty() { None } else { Some(map) },
                ..Default::default()
            },
            rules: None,
            aggregation_rule: None,
        }
    }

    fn request(
        operation: Operation,
        old: Option<ClusterRole>,
        new: Option<ClusterRole>,
    ) -> AdmissionRequest<ClusterRole> {
        AdmissionRequest {
            types: Default::default(),
            uid: String::new(),
            kind: Default::default(),
            resource: Default::default(),
            sub_resource: None,
            request_kind: None,
            request_resource: None,
            request_sub_resource: None,
            name: new.as_ref().or(old.as_ref()).and_then(|o| o.metadata.name.clone()).unwrap_or_default(),
            namespace: None,
            operation,
            user_info: Default::default(),
            object: new,
            old_object: old,
            dry_run: false,
            options: None,
        }
    }

    #[tokio::test]
    async fn create_passes_through() {
        let new = cluster_role("cr-1", &[("management.cattle.io/gr-owner", "gr-a")]);
        let req = request(Operation::Create, None, Some(new));
        let resp = decide(&req).await;
        assert!(resp.allowed);
    }

    #[tokio::test]
    async fn delete_passes_through_without_inspecting_object() {
        let req = request(Operation::Delete, None, None);
        let resp = decide(&req).await;
        assert!(resp.allowed);
    }

    #[tokio::test]
    async fn update_with_owner_label_unchanged_is_allowed() {
        let old = cluster_role("cr-1", &[("management.cattle.io/gr-owner", "gr-a")]);
        let new = cluster_role("cr-1", &[("management.cattle.io/gr-owner", "gr-a"), ("extra", "v")]);
        let req = request(Operation::Update, Some(old), Some(new));
        let resp = decide(&req).await;
        assert!(resp.allowed);
    }

    #[tokio::test]
    async fn update_changing_gr_owner_label_is_denied() {
        let old = cluster_role("cr-1", &[("management.cattle.io/gr-owner", "gr-a")]);
        let new = cluster_role("cr-1", &[("management.cattle.io/gr-owner", "gr-b")]);
        let req = request(Operation::Update, Some(old), Some(new));
        let resp = decide(&req).await;
        assert!(!resp.allowed);
        assert!(resp.result.message.unwrap_or_default().contains("gr-owner label is immutable"));
    }

    #[tokio::test]
    async fn update_removing_grb_owner_label_is_denied() {
        let old = cluster_role("cr-1", &[("management.cattle.io/grb-owner", "grb-a")]);
        let new = cluster_role("cr-1", &[]);
        let req = request(Operation::Update, Some(old), Some(new));
        let resp = decide(&req).await;
        assert!(!resp.allowed);
        assert!(resp.result.message.unwrap_or_default().contains("grb-owner label is immutable"));
    }
}
