//! Drives the recorded admission scenarios of `tests/fixtures/*.yaml`
//! through the compiled admitters, offline — the same fixtures
//! `rbac-webhook-harness test` runs from the command line.

use std::path::Path;

use rbac_webhook::testharness::Scenario;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

async fn check(name: &str) {
    let scenario = Scenario::load(&fixture(name)).unwrap_or_else(|e| panic!("failed to load {name}: {e:?}"));
    if let Err(e) = scenario.check().await {
        panic!("{name}: {e:?}");
    }
}

#[tokio::test]
async fn self_escalation_denied() {
    check("crtb_self_escalation_denied.yaml").await;
}

#[tokio::test]
async fn bind_verb_bypass() {
    check("crtb_bind_verb_bypass.yaml").await;
}

#[tokio::test]
async fn locked_template_with_live_grb_owner() {
    check("crtb_locked_template_live_grb_owner.yaml").await;
}

#[tokio::test]
async fn locked_template_with_deleting_grb_owner() {
    check("crtb_locked_template_deleting_grb_owner.yaml").await;
}

#[tokio::test]
async fn not_found_global_role_on_delete() {
    check("grb_not_found_global_role_on_delete.yaml").await;
}

#[tokio::test]
async fn immutable_field_on_crtb_update() {
    check("crtb_immutable_cluster_name.yaml").await;
}

/// Quantified invariant (§8): an old/new CRTB pair differing only by
/// `ObjectMeta.labels`, with `grb-owner` unchanged, is admitted on update.
#[tokio::test]
async fn meta_only_label_change_is_allowed() {
    check("crtb_meta_only_label_change.yaml").await;
}

#[tokio::test]
async fn prtb_self_escalation_denied() {
    check("prtb_self_escalation_denied.yaml").await;
}

#[tokio::test]
async fn prtb_immutable_project_name() {
    check("prtb_immutable_project_name.yaml").await;
}

#[tokio::test]
async fn user_manage_users_bypass() {
    check("user_manage_users_bypass.yaml").await;
}

#[tokio::test]
async fn user_username_immutable() {
    check("user_username_immutable.yaml").await;
}

#[tokio::test]
async fn user_duplicate_username_denied() {
    check("user_duplicate_username_denied.yaml").await;
}
