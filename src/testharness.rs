//! Offline scenario runner, mirroring the teacher's `types::testcase` +
//! `bin/cli.rs` harness: loads fixture cache contents, stubbed
//! subject-access-review responses and an admission request from YAML, and
//! drives them straight through an admitter's `decide` function — no HTTP,
//! no live cluster.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::authorization::v1::ResourceAttributes;
use k8s_openapi::api::rbac::v1::ClusterRole;
use kube::core::admission::{AdmissionRequest, Operation};
use serde::Deserialize;

use crate::admission::AppState;
use crate::cache::Cache;
use crate::rules::aggregate::AggregateResolver;
use crate::rules::crtb::CrtbRuleResolver;
use crate::rules::global_role::GlobalRoleResolver;
use crate::rules::grb::{self, GrbClusterRuleResolver, Variant};
use crate::rules::prtb::PrtbRuleResolver;
use crate::rules::role_template::RoleTemplateResolver;
use crate::sar::test_support::StubAccessReviewer;
use crate::types::{
    Cluster, ClusterRoleTemplateBinding, GlobalRole, GlobalRoleBinding, ProjectRoleTemplateBinding,
    RoleTemplate, User, UserAttribute,
};

/// Fixture contents for every cache an admitter may read from.
#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct FixtureCaches {
    pub clusters: Vec<Cluster>,
    pub role_templates: Vec<RoleTemplate>,
    pub cluster_roles: Vec<ClusterRole>,
    pub global_roles: Vec<GlobalRole>,
    pub crtbs: Vec<ClusterRoleTemplateBinding>,
    pub prtbs: Vec<ProjectRoleTemplateBinding>,
    pub grbs: Vec<GlobalRoleBinding>,
    pub users: Vec<User>,
    pub user_attributes: Vec<UserAttribute>,
}

/// One stubbed subject-access-review response, keyed the same way
/// `sar::test_support::StubAccessReviewer` keys its responses
/// (`verb`/`group`/`resource`/`name`).
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct SarStub {
    pub verb: String,
    pub group: String,
    pub resource: String,
    pub name: String,
    pub allowed: bool,
}

impl Default for SarStub {
    fn default() -> Self {
        Self {
            verb: String::new(),
            group: String::new(),
            resource: String::new(),
            name: String::new(),
            allowed: false,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Expected {
    pub allowed: bool,
    /// Substring the denial message must contain; ignored when `allowed`.
    #[serde(default)]
    pub message_contains: Option<String>,
}

/// Which admitter a scenario targets.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Crtb,
    Prtb,
    Grb,
    GrbMutate,
    User,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestFixture {
    pub operation: String,
    pub username: String,
    pub groups: Vec<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub object: Option<serde_json::Value>,
    pub old_object: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub kind: Kind,
    #[serde(default)]
    pub caches: FixtureCaches,
    #[serde(default)]
    pub sar_stubs: Vec<SarStub>,
    pub request: RequestFixture,
    pub expected: Expected,
}

/// Outcome of running one scenario against the compiled admitters.
pub struct Outcome {
    pub allowed: bool,
    pub message: Option<String>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open scenario file {}", path.display()))?;
        serde_yaml::from_reader(file).context("failed to deserialize scenario")
    }

    fn operation(&self) -> Result<Operation> {
        Ok(match self.request.operation.as_str() {
            "Create" => Operation::Create,
            "Update" => Operation::Update,
            "Delete" => Operation::Delete,
            "Connect" => Operation::Connect,
            other => bail!("unknown operation {other:?}"),
        })
    }

    fn user_info(&self) -> UserInfo {
        UserInfo {
            username: self.request.username.clone(),
            uid: None,
            groups: Some(self.request.groups.clone()),
            extra: None,
        }
    }

    fn object<T: serde::de::DeserializeOwned>(&self, value: &Option<serde_json::Value>) -> Result<Option<T>> {
        value
            .as_ref()
            .map(|v| serde_json::from_value(v.clone()).context("failed to deserialize fixture object"))
            .transpose()
    }

    fn request<T: serde::de::DeserializeOwned>(&self) -> Result<AdmissionRequest<T>> {
        Ok(AdmissionRequest {
            types: Default::default(),
            uid: String::new(),
            kind: Default::default(),
            resource: Default::default(),
            sub_resource: None,
            request_kind: None,
            request_resource: None,
            request_sub_resource: None,
            name: self.request.name.clone(),
            namespace: self.request.namespace.clone(),
            operation: self.operation()?,
            user_info: self.user_info(),
            object: self.object(&self.request.object)?,
            old_object: self.object(&self.request.old_object)?,
            dry_run: false,
            options: None,
        })
    }

    async fn build_state(&self) -> Result<(AppState, Arc<StubAccessReviewer>)> {
        let reviewer = Arc::new(StubAccessReviewer::new());
        for stub in &self.sar_stubs {
            let attrs = ResourceAttributes {
                verb: Some(stub.verb.clone()),
                group: Some(stub.group.clone()),
                resource: Some(stub.resource.clone()),
                name: Some(stub.name.clone()),
                ..Default::default()
            };
            reviewer.stub(&attrs, stub.allowed);
        }

        let clusters = Arc::new(Cache::new());
        for v in &self.caches.clusters {
            clusters.put(name_of(&v.metadata), v.clone()).await;
        }
        let role_templates = Arc::new(Cache::new());
        for v in &self.caches.role_templates {
            role_templates.put(name_of(&v.metadata), v.clone()).await;
        }
        let cluster_roles = Arc::new(Cache::new());
        for v in &self.caches.cluster_roles {
            cluster_roles.put(name_of(&v.metadata), v.clone()).await;
        }
        let global_roles = Arc::new(Cache::new());
        for v in &self.caches.global_roles {
            global_roles.put(name_of(&v.metadata), v.clone()).await;
        }
        let crtbs = Arc::new(Cache::new());
        for v in &self.caches.crtbs {
            crtbs.put(name_of(&v.metadata), v.clone()).await;
        }
        let prtbs = Arc::new(Cache::new());
        for v in &self.caches.prtbs {
            prtbs.put(name_of(&v.metadata), v.clone()).await;
        }
        let grbs = Arc::new(Cache::new());
        grb::install_indexer(&grbs)
            .await
            .expect("grb indexer installs exactly once per fixture cache");
        for v in &self.caches.grbs {
            grbs.put(name_of(&v.metadata), v.clone()).await;
        }
        let users = Arc::new(Cache::new());
        for v in &self.caches.users {
            users.put(name_of(&v.metadata), v.clone()).await;
        }
        let user_attributes = Arc::new(Cache::new());
        for v in &self.caches.user_attributes {
            user_attributes.put(name_of(&v.metadata), v.clone()).await;
        }

        let role_template_resolver = Arc::new(RoleTemplateResolver::new(
            role_templates.clone(),
            cluster_roles.clone(),
            true,
        ));
        let global_role_resolver = Arc::new(GlobalRoleResolver::new(
            role_template_resolver.clone(),
            role_templates.clone(),
        ));
        let crtb_rule_resolver =
            Arc::new(CrtbRuleResolver::new(crtbs.clone(), role_template_resolver.clone()).await);
        let prtb_rule_resolver =
            Arc::new(PrtbRuleResolver::new(prtbs.clone(), role_template_resolver.clone()).await);
        let grb_cluster_rule_resolver = Arc::new(
            GrbClusterRuleResolver::new(
                grbs.clone(),
                global_roles.clone(),
                global_role_resolver.clone(),
                reviewer.clone(),
                Variant::InheritedClusterRules,
            )
            .await,
        );

        let aggregate_resolver = Arc::new(AggregateResolver::new(vec![
            crtb_rule_resolver.clone(),
            prtb_rule_resolver.clone(),
            grb_cluster_rule_resolver.clone(),
        ]));

        let state = AppState {
            access_reviewer: reviewer.clone(),
            clusters,
            role_templates,
            cluster_roles,
            global_roles,
            crtbs,
            prtbs,
            grbs,
            users,
            user_attributes,
            role_template_resolver,
            global_role_resolver,
            crtb_rule_resolver,
            prtb_rule_resolver,
            grb_cluster_rule_resolver,
            aggregate_resolver,
        };

        Ok((state, reviewer))
    }

    /// Runs the scenario and returns the admitter's decision, without
    /// comparing it against `expected` — callers that just want the
    /// decision (e.g. the CLI harness) use this; `check` is for `#[test]`s.
    pub async fn run(&self) -> Result<Outcome> {
        let (state, _reviewer) = self.build_state().await?;

        let resp = match self.kind {
            Kind::Crtb => {
                let req: AdmissionRequest<ClusterRoleTemplateBinding> = self.request()?;
                crate::admission::crtb::decide(&state, &req)
                    .await
                    .context("crtb admitter failed")?
            }
            Kind::Prtb => {
                let req: AdmissionRequest<ProjectRoleTemplateBinding> = self.request()?;
                crate::admission::prtb::decide(&state, &req)
                    .await
                    .context("prtb admitter failed")?
            }
            Kind::Grb => {
                let req: AdmissionRequest<GlobalRoleBinding> = self.request()?;
                crate::admission::grb::decide(&state, &req)
                    .await
                    .context("grb admitter failed")?
            }
            Kind::GrbMutate => {
                let req: AdmissionRequest<GlobalRoleBinding> = self.request()?;
                crate::admission::grb_mutate::decide(&state, &req)
                    .await
                    .context("grb mutator failed")?
            }
            Kind::User => {
                let req: AdmissionRequest<User> = self.request()?;
                crate::admission::user::decide(&state, &req)
                    .await
                    .context("user admitter failed")?
            }
        };

        Ok(Outcome {
            allowed: resp.allowed,
            message: resp.result.message,
        })
    }

    /// Runs the scenario and asserts the outcome matches `expected`.
    pub async fn check(&self) -> Result<()> {
        let outcome = self.run().await?;
        if outcome.allowed != self.expected.allowed {
            bail!(
                "expected allowed={}, got allowed={} (message: {:?})",
                self.expected.allowed,
                outcome.allowed,
                outcome.message
            );
        }
        if let Some(needle) = &self.expected.message_contains {
            let haystack = outcome.message.unwrap_or_default();
            if !haystack.contains(needle.as_str()) {
                bail!("expected message to contain {needle:?}, got {haystack:?}");
            }
        }
        Ok(())
    }
}

fn name_of(meta: &kube::core::ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}
