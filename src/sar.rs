//! Subject-access-review callouts. Network I/O; each
//! call carries a 5-second deadline so a slow or wedged apiserver can't
//! stall an admission decision past the request's own timeout budget.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::authorization::v1::{
    ExtraValue, ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::api::PostParams;
use kube::Api;
use thiserror::Error;

const DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum Error {
    #[error("subject access review timed out after {0:?}")]
    Timeout(Duration),
    #[error("subject access review request failed: {0}")]
    Kubernetes(#[source] kube::Error),
    #[error("subject access review returned no status")]
    MissingStatus,
}

/// Abstraction over "can this requester do X", so admitters and resolvers
/// can be exercised against recorded responses without a live
/// apiserver.
#[async_trait]
pub trait AccessReviewer: Send + Sync {
    async fn allowed(&self, user: &UserInfo, attrs: ResourceAttributes) -> Result<bool, Error>;
}

pub struct KubeAccessReviewer {
    client: kube::Client,
}

impl KubeAccessReviewer {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccessReviewer for KubeAccessReviewer {
    async fn allowed(&self, user: &UserInfo, attrs: ResourceAttributes) -> Result<bool, Error> {
        let api: Api<SubjectAccessReview> = Api::all(self.client.clone());
        let sar = SubjectAccessReview {
            metadata: Default::default(),
            spec: SubjectAccessReviewSpec {
                resource_attributes: Some(attrs),
                non_resource_attributes: None,
                user: Some(user.username.clone()),
                groups: user.groups.clone(),
                uid: user.uid.clone(),
                extra: user.extra.clone().map(|extra| {
                    extra
                        .into_iter()
                        .map(|(k, v)| (k, ExtraValue(v.0)))
                        .collect()
                }),
            },
            status: None,
        };

        let result = tokio::time::timeout(DEADLINE, api.create(&PostParams::default(), &sar)).await;
        let sar = match result {
            Ok(r) => r.map_err(Error::Kubernetes)?,
            Err(_) => return Err(Error::Timeout(DEADLINE)),
        };

        // A nil-status response is treated as an error, never as "denied".
        let status = sar.status.ok_or(Error::MissingStatus)?;
        Ok(status.allowed)
    }
}

/// The SAR attributes for the privileged service-account admin check:
/// `{verb:*, group:*, resource:*, version:*}`.
pub fn admin_check_attributes() -> ResourceAttributes {
    ResourceAttributes {
        verb: Some("*".to_string()),
        group: Some("*".to_string()),
        resource: Some("*".to_string()),
        version: Some("*".to_string()),
        ..Default::default()
    }
}

fn bind_verb_attributes_for(resource: &str, name: &str) -> ResourceAttributes {
    ResourceAttributes {
        group: Some("management.cattle.io".to_string()),
        version: Some("v3".to_string()),
        resource: Some(resource.to_string()),
        name: Some(name.to_string()),
        verb: Some("bind".to_string()),
        ..Default::default()
    }
}

/// The SAR attributes for the GRB admitter's `bind`-verb bypass:
/// `{group:"management.cattle.io", version:"v3", resource:"globalroles",
/// name, verb:"bind"}`.
pub fn bind_verb_attributes(global_role_name: &str) -> ResourceAttributes {
    bind_verb_attributes_for("globalroles", global_role_name)
}

/// The CRTB/PRTB equivalent: `bind` on the referenced `roletemplates`
/// object rather than a global role.
pub fn bind_verb_attributes_role_template(role_template_name: &str) -> ResourceAttributes {
    bind_verb_attributes_for("roletemplates", role_template_name)
}

/// Not `#[cfg(test)]`: the offline scenario harness (`testharness`,
/// `bin/harness.rs`) links this in ordinary (non-test) builds too.
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Stubbed reviewer keyed by `(verb, group, resource, name)`, for use in
    /// the test harness and unit tests.
    #[derive(Default)]
    pub struct StubAccessReviewer {
        responses: Mutex<HashMap<(String, String, String, String), bool>>,
    }

    impl StubAccessReviewer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn stub(&self, attrs: &ResourceAttributes, allowed: bool) {
            self.responses.lock().unwrap().insert(key(attrs), allowed);
        }
    }

    fn key(attrs: &ResourceAttributes) -> (String, String, String, String) {
        (
            attrs.verb.clone().unwrap_or_default(),
            attrs.group.clone().unwrap_or_default(),
            attrs.resource.clone().unwrap_or_default(),
            attrs.name.clone().unwrap_or_default(),
        )
    }

    #[async_trait]
    impl AccessReviewer for StubAccessReviewer {
        async fn allowed(&self, _user: &UserInfo, attrs: ResourceAttributes) -> Result<bool, Error> {
            Ok(*self.responses.lock().unwrap().get(&key(&attrs)).unwrap_or(&false))
        }
    }
}
