//! Minimal `Cluster` shape, needed only for CRTB's `clusterName` referential
//! integrity check. The platform's full cluster model is out of
//! scope — this is the stand-in the CRTB admitter's cluster cache is
//! keyed on.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(group = "management.cattle.io", version = "v3", kind = "Cluster", shortname = "c")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub display_name: String,
}
