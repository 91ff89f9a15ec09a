//! # Reconciliation Logic
//!
//! Main reconcile function for Decofile resources. Errors are classified
//! and requeued by the error policy layer so a failing resource never
//! blocks the watch stream.

use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

use crate::controller::source::new_source;
use crate::crd::{Condition, Decofile, SourceType, CONDITION_PODS_NOTIFIED, CONDITION_READY};
use crate::observability;

use super::configmap::{self, configmap_name};
use super::encoding::encode_document;
use super::status::{generation_identifier, update_status};
use super::types::{ReconcileError, Reconciler};

/// Reconcile one Decofile event.
pub async fn reconcile(
    decofile: Arc<Decofile>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcileError> {
    let name = decofile.name_any();
    let namespace = decofile.namespace().unwrap_or_else(|| "default".to_string());

    info!(resource = %format!("{namespace}/{name}"), "Reconciling Decofile");
    observability::metrics::increment_reconciliations();

    let source = new_source(ctx.client.clone(), &ctx.config, &decofile)?;

    // An unchanged archive revision with an existing ConfigMap is a no-op;
    // no download happens
    if revision_already_materialized(&ctx, &decofile, &namespace, &name).await? {
        debug!(resource = %format!("{namespace}/{name}"), "Revision unchanged, skipping download");
        return Ok(Action::await_change());
    }

    let document = match source.retrieve().await {
        Ok(document) => document,
        Err(error) => {
            record_failure(&ctx, &namespace, &name, &error).await;
            return Err(error);
        }
    };

    let (content_key, content) = match encode_document(&document.json) {
        Ok(encoded) => encoded,
        Err(error) => {
            record_failure(&ctx, &namespace, &name, &error).await;
            return Err(error);
        }
    };

    let outcome = configmap::upsert(&ctx.client, &decofile, content_key, content).await?;
    if outcome.change.requires_notification() || outcome.change == configmap::ChangeKind::CreatedNew
    {
        observability::metrics::increment_configmap_writes();
    }

    let identifier = generation_identifier(document.revision.as_deref(), outcome.timestamp);
    let deployment_id = decofile.effective_deployment_id().to_string();

    let mut notify_error = None;
    let mut notified = false;
    if outcome.change.requires_notification() {
        if decofile.spec.silent {
            debug!(resource = %format!("{namespace}/{name}"), "Content changed but Decofile is silent, skipping notification");
        } else {
            notified = true;
            info!(timestamp = outcome.timestamp, "ConfigMap data changed, notifying pods");

            // Announce the in-flight fan-out before launching it
            let in_flight = Condition::new(
                CONDITION_PODS_NOTIFIED,
                "Unknown",
                "NotificationInFlight",
                format!("notifying pods for {identifier}"),
            );
            let _ = update_status(&ctx.client, &namespace, &name, |status| {
                status.upsert_condition(in_flight);
            })
            .await;

            match ctx
                .notifier
                .notify_pods(&namespace, &deployment_id, outcome.timestamp, &document.json)
                .await
            {
                Ok(result) => {
                    observability::metrics::add_pods_notified(result.succeeded as u64);
                }
                Err(error) => {
                    observability::metrics::increment_notification_failures();
                    warn!(resource = %format!("{namespace}/{name}"), %error, "Pod notification failed");
                    notify_error = Some(error);
                }
            }
        }
    }

    let config_map = configmap_name(&name);
    let source_type = source.kind().as_str().to_string();
    let revision = document.revision.clone();
    let identifier_for_status = identifier.clone();
    let notify_condition = notify_error.as_ref().map(|error| {
        (
            error.reason().to_string(),
            format!("{error} ({identifier_for_status})"),
        )
    });
    update_status(&ctx.client, &namespace, &name, move |status| {
        status.config_map_name = Some(config_map.clone());
        status.last_updated = Some(chrono::Utc::now().to_rfc3339());
        status.source_type = Some(source_type.clone());
        if let Some(revision) = &revision {
            status.last_seen_revision = Some(revision.clone());
        }
        status.upsert_condition(Condition::new(
            CONDITION_READY,
            "True",
            "ConfigMapCreated",
            format!("ConfigMap {config_map} created from {source_type} source"),
        ));
        if notified {
            let condition = match &notify_condition {
                None => Condition::new(
                    CONDITION_PODS_NOTIFIED,
                    "True",
                    "AllPodsNotified",
                    format!("pods notified for {identifier}"),
                ),
                Some((reason, message)) => {
                    Condition::new(CONDITION_PODS_NOTIFIED, "False", reason.clone(), message.clone())
                }
            };
            status.upsert_condition(condition);
        }
    })
    .await?;

    if let Some(error) = notify_error {
        return Err(error);
    }

    ctx.reset_backoff(&namespace, &name);
    info!(resource = %format!("{namespace}/{name}"), "Successfully reconciled Decofile");
    Ok(Action::await_change())
}

/// Cached-skip check for archive sources: when the stored revision already
/// matches the declared commit and the owned ConfigMap exists, the
/// reconcile is a no-op and no download happens.
async fn revision_already_materialized(
    ctx: &Reconciler,
    decofile: &Decofile,
    namespace: &str,
    name: &str,
) -> Result<bool, ReconcileError> {
    if decofile.spec.source != SourceType::Github {
        return Ok(false);
    }
    let Some(github) = decofile.spec.github.as_ref() else {
        return Ok(false);
    };
    let last_seen = decofile
        .status
        .as_ref()
        .and_then(|status| status.last_seen_revision.as_deref());
    if last_seen != Some(github.commit.as_str()) {
        return Ok(false);
    }

    let api: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    Ok(api.get_opt(&configmap_name(name)).await?.is_some())
}

/// Record a retrieval or encoding failure on the Ready condition. The
/// status write itself is best-effort; the original error is what gets
/// requeued.
async fn record_failure(ctx: &Reconciler, namespace: &str, name: &str, error: &ReconcileError) {
    let condition = Condition::new(CONDITION_READY, "False", error.reason(), error.to_string());
    if let Err(status_error) = update_status(&ctx.client, namespace, name, |status| {
        status.upsert_condition(condition);
    })
    .await
    {
        warn!(resource = %format!("{namespace}/{name}"), %status_error, "Failed to record error condition");
    }
}
