//! # Decofile Operator
//!
//! Controller entrypoint: initializes tracing and metrics, starts the HTTP
//! server (metrics, probes and admission webhooks), and runs the Decofile
//! controller until shutdown.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use tracing::{error, info};

use decofile_operator::config::Config;
use decofile_operator::controller::error_policy::error_policy;
use decofile_operator::controller::reconciler::{reconcile, Reconciler};
use decofile_operator::crd::Decofile;
use decofile_operator::observability;
use decofile_operator::server::{start_server, ServerState};
use decofile_operator::webhook::WebhookState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decofile_operator=info".into()),
        )
        .init();

    info!("Starting Decofile operator");

    observability::metrics::register_metrics()?;

    let config = Config::from_env();
    let server_port = config.server_port;

    let client = Client::try_default().await?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
    });
    let webhook_state = Arc::new(WebhookState::new(client.clone()));

    let server_state_clone = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone, webhook_state).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Watch Decofiles across all namespaces, plus the ConfigMaps they own
    // so out-of-band edits get reconciled away
    let decofiles: Api<Decofile> = Api::all(client.clone());
    let configmaps: Api<ConfigMap> = Api::all(client.clone());

    let reconciler = Arc::new(Reconciler::new(client, config)?);

    server_state
        .is_ready
        .store(true, std::sync::atomic::Ordering::Relaxed);

    Controller::new(decofiles, watcher::Config::default())
        .owns(configmaps, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|_| std::future::ready(()))
        .await;

    info!("Controller stopped");
    Ok(())
}
