//! `User` and its attribute side-cache, needed by the User admitter.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(group = "management.cattle.io", version = "v3", kind = "User", shortname = "u")]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
}

/// Groups a user currently belongs to, refreshed on login — a separate
/// object from `User` because group membership is derived from an
/// external identity provider and may lag the `User` object itself.
#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "UserAttribute",
    shortname = "ua"
)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributeSpec {
    #[serde(default)]
    pub group_principals: Vec<String>,
}
