//! GRB Mutator: attaches an owner reference from a new
//! GlobalRoleBinding to its referenced GlobalRole.

use axum::{extract, response, Json};
use http::StatusCode;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::Resource;
use thiserror::Error;

use crate::types::GlobalRoleBinding;

use super::{responses, AppState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to serialize object: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to build patch: {0}")]
    SerializePatch(#[source] kube::core::admission::SerializePatchError),
}

impl response::IntoResponse for Error {
    fn into_response(self) -> response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub async fn mutate(
    extract::State(state): extract::State<AppState>,
    Json(review): Json<AdmissionReview<GlobalRoleBinding>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, Error> {
    let req: AdmissionRequest<GlobalRoleBinding> = match review.try_into() {
        Ok(req) => req,
        Err(error) => {
            tracing::error!(%error, "invalid grb mutation request");
            return Ok(Json(
                AdmissionResponse::invalid(error.to_string()).into_review(),
            ));
        }
    };

    let resp = decide(&state, &req).await?;
    Ok(Json(resp.into_review()))
}

pub(crate) async fn decide(state: &AppState, req: &AdmissionRequest<GlobalRoleBinding>) -> Result<AdmissionResponse, Error> {
    let base: AdmissionResponse = req.into();

    if req.operation != Operation::Create {
        return Ok(base);
    }

    let Some(new) = &req.object else {
        return Ok(responses::bad_request(base, "missing object"));
    };

    let Some(gr) = state.global_roles.get(&new.spec.global_role_name).await else {
        return Ok(responses::bad_request(
            base,
            format!("globalRoleName {:?} not found", new.spec.global_role_name),
        ));
    };

    let owner_ref = OwnerReference {
        api_version: crate::types::GlobalRole::api_version(&()).into_owned(),
        kind: crate::types::GlobalRole::kind(&()).into_owned(),
        name: gr.metadata.name.clone().unwrap_or_default(),
        uid: gr.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    let existing = new.metadata.owner_references.clone().unwrap_or_default();
    let already_owned = existing.iter().any(|r| {
        r.api_version == owner_ref.api_version
            && r.kind == owner_ref.kind
            && r.name == owner_ref.name
            && r.uid == owner_ref.uid
            && r.controller == owner_ref.controller
            && r.block_owner_deletion == owner_ref.block_owner_deletion
    });
    if already_owned {
        return Ok(base);
    }

    let mut updated = existing;
    updated.push(owner_ref);

    let original = serde_json::to_value(new).map_err(Error::Serialize)?;
    let mut modified = original.clone();
    modified["metadata"]["ownerReferences"] =
        serde_json::to_value(&updated).map_err(Error::Serialize)?;

    let patch = json_patch::diff(&original, &modified);
    base.with_patch(patch).map_err(Error::SerializePatch)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kube::core::{admission::Operation, ObjectMeta};

    use crate::cache::Cache;
    use crate::rules::aggregate::AggregateResolver;
    use crate::rules::crtb::CrtbRuleResolver;
    use crate::rules::global_role::GlobalRoleResolver;
    use crate::rules::grb::{self, GrbClusterRuleResolver, Variant};
    use crate::rules::prtb::PrtbRuleResolver;
    use crate::rules::role_template::RoleTemplateResolver;
    use crate::sar::test_support::StubAccessReviewer;
    use crate::types::{GlobalRole, GlobalRoleBindingSpec};

    use super::*;

    async fn state_with_global_role(gr: GlobalRole) -> AppState {
        let global_roles = Arc::new(Cache::new());
        global_roles.put(gr.metadata.name.clone().unwrap_or_default(), gr).await;

        let role_templates = Arc::new(Cache::new());
        let cluster_roles = Arc::new(Cache::new());
        let crtbs = Arc::new(Cache::new());
        let prtbs = Arc::new(Cache::new());
        let grbs = Arc::new(Cache::new());
        grb::install_indexer(&grbs).await.unwrap();

        let access_reviewer = Arc::new(StubAccessReviewer::new());
        let role_template_resolver =
            Arc::new(RoleTemplateResolver::new(role_templates.clone(), cluster_roles.clone(), true));
        let global_role_resolver =
            Arc::new(GlobalRoleResolver::new(role_template_resolver.clone(), role_templates.clone()));
        let crtb_rule_resolver =
            Arc::new(CrtbRuleResolver::new(crtbs.clone(), role_template_resolver.clone()).await);
        let prtb_rule_resolver =
            Arc::new(PrtbRuleResolver::new(prtbs.clone(), role_template_resolver.clone()).await);
        let grb_cluster_rule_resolver = Arc::new(
            GrbClusterRuleResolver::new(
                grbs.clone(),
                global_roles.clone(),
                global_role_resolver.clone(),
                access_reviewer.clone(),
                Variant::InheritedClusterRules,
            )
            .await,
        );
        let aggregate_resolver = Arc::new(AggregateResolver::new(vec![
            crtb_rule_resolver.clone(),
            prtb_rule_resolver.clone(),
            grb_cluster_rule_resolver.clone(),
        ]));

        AppState {
            access_reviewer,
            clusters: Arc::new(Cache::new()),
            role_templates,
            cluster_roles,
            global_roles,
            crtbs,
            prtbs,
            grbs,
            users: Arc::new(Cache::new()),
            user_attributes: Arc::new(Cache::new()),
            role_template_resolver,
            global_role_resolver,
            crtb_rule_resolver,
            prtb_rule_resolver,
            grb_cluster_rule_resolver,
            aggregate_resolver,
        }
    }

    fn request(binding: GlobalRoleBinding) -> AdmissionRequest<GlobalRoleBinding> {
        AdmissionRequest {
            types: Default::default(),
            uid: String::new(),
            kind: Default::default(),
            resource: Default::default(),
            sub_resource: None,
            request_kind: None,
            request_resource: None,
            request_sub_resource: None,
            name: binding.metadata.name.clone().unwrap_or_default(),
            namespace: None,
            operation: Operation::Create,
            user_info: Default::default(),
            object: Some(binding),
            old_object: None,
            dry_run: false,
            options: None,
        }
    }

    /// Applying the emitted patch twice must not duplicate the owner
    /// reference — the second mutation call sees it already present and
    /// returns an unpatched response.
    #[tokio::test]
    async fn applying_patch_twice_does_not_duplicate_owner_reference() {
        let gr = GlobalRole {
            metadata: ObjectMeta {
                name: Some("gr-a".to_string()),
                uid: Some("gr-a-uid".to_string()),
                ..Default::default()
            },
            spec: Default::default(),
        };
        let state = state_with_global_role(gr).await;

        let binding = GlobalRoleBinding {
            metadata: ObjectMeta {
                name: Some("grb-1".to_string()),
                ..Default::default()
            },
            spec: GlobalRoleBindingSpec {
                global_role_name: "gr-a".to_string(),
                user_name: Some("u1".to_string()),
                group_principal_name: None,
            },
        };

        let req = request(binding.clone());
        let resp = decide(&state, &req).await.unwrap();
        let patch_bytes = resp.patch.expect("first mutation emits an owner-reference patch");
        let patch: json_patch::Patch = serde_json::from_slice(&patch_bytes).unwrap();

        let mut value = serde_json::to_value(&binding).unwrap();
        json_patch::patch(&mut value, &patch).unwrap();
        let patched: GlobalRoleBinding = serde_json::from_value(value).unwrap();

        let owner_refs = patched.metadata.owner_references.clone().unwrap_or_default();
        assert_eq!(owner_refs.len(), 1);

        let req2 = request(patched);
        let resp2 = decide(&state, &req2).await.unwrap();
        assert!(resp2.patch.is_none(), "second mutation must be a no-op once owned");
    }
}
