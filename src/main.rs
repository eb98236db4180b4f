use std::sync::Arc;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;

use rbac_webhook::admission::AppState;
use rbac_webhook::cache::Cache;
use rbac_webhook::config::{Config, CONFIG};
use rbac_webhook::rules::aggregate::AggregateResolver;
use rbac_webhook::rules::crtb::CrtbRuleResolver;
use rbac_webhook::rules::global_role::GlobalRoleResolver;
use rbac_webhook::rules::grb::{self, GrbClusterRuleResolver, Variant};
use rbac_webhook::rules::prtb::PrtbRuleResolver;
use rbac_webhook::rules::role_template::RoleTemplateResolver;
use rbac_webhook::sar::{AccessReviewer, KubeAccessReviewer};

/// Generate future that awaits shutdown signal
async fn shutdown_signal(axum_server_handle: axum_server::Handle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    axum_server_handle.graceful_shutdown(Some(std::time::Duration::from_secs(30)));
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config: &Config = &CONFIG;

    let kube_config = kube::Config::infer().await?;
    let client: kube::Client = kube_config.try_into()?;

    rbac_webhook::webhookconfig::register_all(&client, config)
        .await
        .context("failed to register webhook configurations")?;

    let state = build_state(client, config).await?;
    let http_app = rbac_webhook::admission::router(state);

    let tls_config = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await?;

    let axum_server_handle = axum_server::Handle::new();
    let shutdown_signal_fut = shutdown_signal(axum_server_handle.clone());
    tokio::spawn(shutdown_signal_fut);

    tracing::info!(addr = %config.listen_addr, "serving admission webhook");
    axum_server::bind_rustls(config.listen_addr.parse()?, tls_config)
        .handle(axum_server_handle)
        .serve(http_app.into_make_service())
        .await?;

    Ok(())
}

/// Wires every cache and resolver the admitters depend on. Caches start empty;
/// populating them from the live API server is the surrounding platform's
/// job.
async fn build_state(client: kube::Client, config: &Config) -> Result<AppState> {
    let access_reviewer: Arc<dyn AccessReviewer> = Arc::new(KubeAccessReviewer::new(client));

    let clusters = Arc::new(Cache::new());
    let role_templates = Arc::new(Cache::new());
    let cluster_roles = Arc::new(Cache::new());
    let global_roles = Arc::new(Cache::new());
    let crtbs = Arc::new(Cache::new());
    let prtbs = Arc::new(Cache::new());
    let grbs = Arc::new(Cache::new());
    grb::install_indexer(&grbs)
        .await
        .context("failed to install grb subject indexer")?;
    let users = Arc::new(Cache::new());
    let user_attributes = Arc::new(Cache::new());

    let role_template_resolver = Arc::new(RoleTemplateResolver::new(
        role_templates.clone(),
        cluster_roles.clone(),
        config.external_rules_enabled,
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

    Ok(AppState {
        access_reviewer,
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
    })
}
