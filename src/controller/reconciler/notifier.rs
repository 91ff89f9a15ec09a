//! # Pod Notifier
//!
//! Tells bound workload pods to reload after a content change.
//!
//! Pods are discovered by label, then re-read individually so IP, phase and
//! environment reflect the current state rather than a stale cache. The
//! fan-out runs through a bounded worker pool under a single global
//! deadline; each pod gets up to three attempts with doubling backoff.
//! Vanished or non-running pods are skips, never failures.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::{
    APP_CONTAINER_NAME, DECOFILE_LABEL, DEFAULT_RELOAD_PORT, NOTIFY_INITIAL_BACKOFF_SECS,
    NOTIFY_MAX_RETRIES, NOTIFY_REQUEST_TIMEOUT_SECS, RELOAD_PATH, RELOAD_TOKEN_ENV,
};

use super::types::ReconcileError;

/// Aggregate result of a notification fan-out
#[derive(Debug, Clone, Default)]
pub struct NotifyOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// One `podName: cause` entry per failed pod
    pub errors: Vec<String>,
}

enum PodNotifyResult {
    Notified,
    Skipped,
    Failed(String),
}

/// Handles notifying pods about ConfigMap changes
pub struct Notifier {
    client: Client,
    http: reqwest::Client,
    concurrency: usize,
    deadline: Duration,
}

impl Notifier {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create notification HTTP client")?;
        Ok(Self {
            client,
            http,
            concurrency: config.notify_concurrency,
            deadline: config.notify_deadline,
        })
    }

    /// Notify every pod bound to `deployment_id` in `namespace` that the
    /// configuration changed.
    ///
    /// The JSON payload is marshalled once and shared read-only across all
    /// requests. Per-pod failures are aggregated into `NotifyPartial`; an
    /// elapsed global deadline aborts the remaining requests and returns
    /// `NotifyTimeout` carrying the partial success count.
    pub async fn notify_pods(
        &self,
        namespace: &str,
        deployment_id: &str,
        timestamp: u64,
        document_json: &str,
    ) -> Result<NotifyOutcome, ReconcileError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("{DECOFILE_LABEL}={deployment_id}");
        let list = pods.list(&ListParams::default().labels(&selector)).await?;

        if list.items.is_empty() {
            debug!(%selector, "No pods bound to Decofile, nothing to notify");
            return Ok(NotifyOutcome::default());
        }

        // Only names are taken from the listing; each worker re-reads its pod
        let pod_names: Vec<String> = list.items.iter().map(ResourceExt::name_any).collect();
        let total = pod_names.len();
        info!(
            pods = total,
            concurrency = self.concurrency,
            "Starting parallel pod notifications"
        );

        let payload = build_payload(timestamp, document_json)?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let outcome = Arc::new(Mutex::new(NotifyOutcome::default()));
        let mut tasks = JoinSet::new();

        for pod_name in pod_names {
            let semaphore = semaphore.clone();
            let outcome = outcome.clone();
            let pods = pods.clone();
            let http = self.http.clone();
            let payload = payload.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = notify_pod_with_retry(&pods, &http, &pod_name, &payload).await;
                let mut aggregate = match outcome.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match result {
                    PodNotifyResult::Notified => {
                        info!(pod = %pod_name, "Successfully notified pod");
                        aggregate.succeeded += 1;
                    }
                    PodNotifyResult::Skipped => aggregate.skipped += 1,
                    PodNotifyResult::Failed(cause) => {
                        warn!(pod = %pod_name, %cause, "Failed to notify pod");
                        aggregate.failed += 1;
                        aggregate.errors.push(format!("{pod_name}: {cause}"));
                    }
                }
            });
        }

        let timed_out = tokio::time::timeout(self.deadline, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(error) = result {
                    warn!("Notification task aborted: {error}");
                }
            }
        })
        .await
        .is_err();

        if timed_out {
            tasks.abort_all();
            let partial = snapshot(&outcome);
            return Err(ReconcileError::NotifyTimeout {
                notified: partial.succeeded,
                total,
            });
        }

        let outcome = snapshot(&outcome);
        info!(
            success = outcome.succeeded,
            failed = outcome.failed,
            skipped = outcome.skipped,
            total,
            "Notification summary"
        );

        if outcome.failed > 0 {
            return Err(ReconcileError::NotifyPartial {
                failed: outcome.failed,
                detail: outcome.errors.join("; "),
            });
        }
        Ok(outcome)
    }
}

fn snapshot(outcome: &Arc<Mutex<NotifyOutcome>>) -> NotifyOutcome {
    match outcome.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Marshal the reload payload once for the whole fan-out.
fn build_payload(timestamp: u64, document_json: &str) -> Result<Bytes, ReconcileError> {
    let document: serde_json::Value = serde_json::from_str(document_json)
        .map_err(|e| ReconcileError::Encoding(format!("document is not valid JSON: {e}")))?;
    let payload = serde_json::to_vec(&serde_json::json!({
        "timestamp": timestamp.to_string(),
        "source": "operator",
        "decofile": document,
    }))
    .map_err(|e| ReconcileError::Encoding(format!("failed to marshal payload: {e}")))?;
    Ok(Bytes::from(payload))
}

/// Re-read one pod and POST the reload payload with retries.
async fn notify_pod_with_retry(
    pods: &Api<Pod>,
    http: &reqwest::Client,
    pod_name: &str,
    payload: &Bytes,
) -> PodNotifyResult {
    // Fresh read: IP, phase and env may have changed since discovery
    let pod = match pods.get_opt(pod_name).await {
        Ok(Some(pod)) => pod,
        Ok(None) => {
            debug!(pod = %pod_name, "Pod no longer exists, skipping");
            return PodNotifyResult::Skipped;
        }
        Err(error) => return PodNotifyResult::Failed(format!("failed to get pod: {error}")),
    };

    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .unwrap_or("");
    if phase != "Running" {
        debug!(pod = %pod_name, phase, "Skipping non-running pod");
        return PodNotifyResult::Skipped;
    }

    let Some(pod_ip) = pod
        .status
        .as_ref()
        .and_then(|status| status.pod_ip.as_deref())
        .filter(|ip| !ip.is_empty())
    else {
        debug!(pod = %pod_name, "Skipping pod without IP");
        return PodNotifyResult::Skipped;
    };

    let port = reload_port(&pod);
    let token = reload_token(&pod);
    let url = format!("http://{pod_ip}:{port}{RELOAD_PATH}");

    let mut backoff = Duration::from_secs(NOTIFY_INITIAL_BACKOFF_SECS);
    let mut last_error = String::new();

    for attempt in 1..=NOTIFY_MAX_RETRIES {
        debug!(pod = %pod_name, attempt, "Attempting to notify pod");

        let mut request = http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.clone());
        if let Some(token) = &token {
            request = request.header(AUTHORIZATION, format!("Token {token}"));
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => return PodNotifyResult::Notified,
            Ok(response) => {
                last_error = format!("pod returned status {}", response.status().as_u16());
            }
            Err(error) => last_error = format!("request failed: {error}"),
        }

        if attempt < NOTIFY_MAX_RETRIES {
            debug!(pod = %pod_name, backoff_secs = backoff.as_secs(), %last_error, "Retrying after backoff");
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    PodNotifyResult::Failed(format!("max retries reached: {last_error}"))
}

/// The pod's first container's first declared port, or the platform default.
fn reload_port(pod: &Pod) -> i32 {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .and_then(|container| container.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|port| port.container_port)
        .unwrap_or(DEFAULT_RELOAD_PORT)
}

/// The reload token exposed by the `app` container, if any.
fn reload_token(pod: &Pod) -> Option<String> {
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .find(|container| container.name == APP_CONTAINER_NAME)?
        .env
        .as_ref()?
        .iter()
        .find(|env| env.name == RELOAD_TOKEN_ENV)?
        .value
        .clone()
}
