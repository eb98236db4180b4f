//! Webhook registration: a static table describing, per admitter, its
//! GVR, handled operations, scope and optional object-label selector,
//! applied once at startup via server-side apply — the same
//! `Patch::Apply` + `PatchParams::apply(<field-manager>)` idiom the
//! teacher's reconciler uses for its own `ValidatingWebhookConfiguration`/
//! `MutatingWebhookConfiguration` objects. Unlike the teacher, there is no
//! continuous reconcile loop: the resources admitted here are fixed
//! built-in/CRD kinds rather than user-authored rule objects, so
//! registration happens once and is simply re-applied idempotently on
//! every restart.

use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::ByteString;
use kube::api::{Patch, PatchParams};
use kube::core::ObjectMeta;
use kube::{Api, Client};
use thiserror::Error;

use crate::config::Config;

const FIELD_MANAGER: &str = "rbac-webhook";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to apply ValidatingWebhookConfiguration: {0}")]
    ApplyValidating(#[source] kube::Error),
    #[error("failed to apply MutatingWebhookConfiguration: {0}")]
    ApplyMutating(#[source] kube::Error),
}

/// One admitted resource kind's registration shape.
pub struct AdmitterRegistration {
    pub rule_name: &'static str,
    pub group: &'static str,
    pub version: &'static str,
    pub resource: &'static str,
    pub operations: &'static [&'static str],
    pub scope: &'static str,
    pub path: &'static str,
    /// Label key the webhook's object-selector requires to be present.
    /// `None` means every object of this kind is intercepted.
    pub label_selector_key: Option<&'static str>,
    pub mutating: bool,
}

pub const ADMITTERS: &[AdmitterRegistration] = &[
    AdmitterRegistration {
        rule_name: "rbac-webhook-clusterroletemplatebindings",
        group: "management.cattle.io",
        version: "v3",
        resource: "clusterroletemplatebindings",
        operations: &["CREATE", "UPDATE", "DELETE"],
        scope: "Namespaced",
        path: "/validate/clusterroletemplatebindings",
        label_selector_key: None,
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-projectroletemplatebindings",
        group: "management.cattle.io",
        version: "v3",
        resource: "projectroletemplatebindings",
        operations: &["CREATE", "UPDATE", "DELETE"],
        scope: "Namespaced",
        path: "/validate/projectroletemplatebindings",
        label_selector_key: None,
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-globalrolebindings",
        group: "management.cattle.io",
        version: "v3",
        resource: "globalrolebindings",
        operations: &["CREATE", "UPDATE", "DELETE"],
        scope: "Cluster",
        path: "/validate/globalrolebindings",
        label_selector_key: None,
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-globalrolebindings-mutate",
        group: "management.cattle.io",
        version: "v3",
        resource: "globalrolebindings",
        operations: &["CREATE"],
        scope: "Cluster",
        path: "/mutate/globalrolebindings",
        label_selector_key: None,
        mutating: true,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-users",
        group: "management.cattle.io",
        version: "v3",
        resource: "users",
        operations: &["CREATE", "UPDATE"],
        scope: "Cluster",
        path: "/validate/users",
        label_selector_key: None,
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-clusterroles",
        group: "rbac.authorization.k8s.io",
        version: "v1",
        resource: "clusterroles",
        operations: &["CREATE", "UPDATE"],
        scope: "Cluster",
        path: "/validate/clusterroles",
        label_selector_key: Some("management.cattle.io/gr-owner"),
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-clusterrolebindings",
        group: "rbac.authorization.k8s.io",
        version: "v1",
        resource: "clusterrolebindings",
        operations: &["CREATE", "UPDATE"],
        scope: "Cluster",
        path: "/validate/clusterrolebindings",
        label_selector_key: Some("management.cattle.io/grb-owner"),
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-roles",
        group: "rbac.authorization.k8s.io",
        version: "v1",
        resource: "roles",
        operations: &["CREATE", "UPDATE"],
        scope: "Namespaced",
        path: "/validate/roles",
        label_selector_key: Some("management.cattle.io/gr-owner"),
        mutating: false,
    },
    AdmitterRegistration {
        rule_name: "rbac-webhook-rolebindings",
        group: "rbac.authorization.k8s.io",
        version: "v1",
        resource: "rolebindings",
        operations: &["CREATE", "UPDATE"],
        scope: "Namespaced",
        path: "/validate/rolebindings",
        label_selector_key: Some("management.cattle.io/grb-owner"),
        mutating: false,
    },
];

fn client_config(config: &Config, reg: &AdmitterRegistration) -> WebhookClientConfig {
    WebhookClientConfig {
        ca_bundle: Some(ByteString(config.ca_bundle.as_bytes().to_vec())),
        service: Some(ServiceReference {
            namespace: config.service_namespace.clone(),
            name: config.service_name.clone(),
            path: Some(reg.path.to_string()),
            port: Some(config.service_port),
        }),
        url: None,
    }
}

fn rule_with_operations(reg: &AdmitterRegistration) -> RuleWithOperations {
    RuleWithOperations {
        api_groups: Some(vec![reg.group.to_string()]),
        api_versions: Some(vec![reg.version.to_string()]),
        operations: Some(reg.operations.iter().map(|s| s.to_string()).collect()),
        resources: Some(vec![reg.resource.to_string()]),
        scope: Some(reg.scope.to_string()),
    }
}

fn object_selector(reg: &AdmitterRegistration) -> Option<k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector> {
    let key = reg.label_selector_key?;
    Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector {
        match_expressions: Some(vec![
            k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement {
                key: key.to_string(),
                operator: "Exists".to_string(),
                values: None,
            },
        ]),
        match_labels: None,
    })
}

/// Applies every entry of `ADMITTERS` as a `ValidatingWebhookConfiguration`
/// or `MutatingWebhookConfiguration`, idempotently, via server-side apply.
pub async fn register_all(client: &Client, config: &Config) -> Result<(), Error> {
    let mut validating_rules = Vec::new();
    let mut mutating_rules = Vec::new();

    for reg in ADMITTERS {
        if reg.mutating {
            mutating_rules.push(reg);
        } else {
            validating_rules.push(reg);
        }
    }

    if !validating_rules.is_empty() {
        let webhooks = validating_rules
            .iter()
            .map(|reg| ValidatingWebhook {
                name: format!("{}.rbac.cattle.io", reg.rule_name),
                client_config: client_config(config, reg),
                rules: Some(vec![rule_with_operations(reg)]),
                object_selector: object_selector(reg),
                admission_review_versions: vec!["v1".to_string()],
                side_effects: "None".to_string(),
                failure_policy: Some("Fail".to_string()),
                ..Default::default()
            })
            .collect();

        let vwc = ValidatingWebhookConfiguration {
            metadata: ObjectMeta {
                name: Some("rbac-webhook".to_string()),
                labels: Some(BTreeMap::from([(
                    "management.cattle.io/managed-by".to_string(),
                    "rbac-webhook".to_string(),
                )])),
                ..Default::default()
            },
            webhooks: Some(webhooks),
        };

        let api: Api<ValidatingWebhookConfiguration> = Api::all(client.clone());
        api.patch(
            "rbac-webhook",
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Apply(&vwc),
        )
        .await
        .map_err(Error::ApplyValidating)?;
    }

    if !mutating_rules.is_empty() {
        let webhooks = mutating_rules
            .iter()
            .map(|reg| MutatingWebhook {
                name: format!("{}.rbac.cattle.io", reg.rule_name),
                client_config: client_config(config, reg),
                rules: Some(vec![rule_with_operations(reg)]),
                object_selector: object_selector(reg),
                admission_review_versions: vec!["v1".to_string()],
                side_effects: "None".to_string(),
                failure_policy: Some("Fail".to_string()),
                ..Default::default()
            })
            .collect();

        let mwc = MutatingWebhookConfiguration {
            metadata: ObjectMeta {
                name: Some("rbac-webhook".to_string()),
                labels: Some(BTreeMap::from([(
                    "management.cattle.io/managed-by".to_string(),
                    "rbac-webhook".to_string(),
                )])),
                ..Default::default()
            },
            webhooks: Some(webhooks),
        };

        let api: Api<MutatingWebhookConfiguration> = Api::all(client.clone());
        api.patch(
            "rbac-webhook",
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Apply(&mwc),
        )
        .await
        .map_err(Error::ApplyMutating)?;
    }

    Ok(())
}
