//! # Error Policy
//!
//! Maps reconciliation errors to requeue decisions. Spec errors the user
//! has to fix are requeued quietly; transient failures back off
//! exponentially per resource; write conflicts retry immediately.

use std::sync::Arc;
use std::time::Duration;

use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{error, info};

use crate::constants::{
    CONFLICT_REQUEUE_SECS, CREDENTIAL_MISSING_REQUEUE_SECS, INVALID_SPEC_REQUEUE_SECS,
    NOTIFY_FAILURE_REQUEUE_SECS,
};
use crate::controller::reconciler::{ReconcileError, Reconciler};
use crate::crd::Decofile;
use crate::observability;

/// Decide how to requeue after a reconcile error.
pub fn error_policy(
    decofile: Arc<Decofile>,
    error: &ReconcileError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = decofile.name_any();
    let namespace = decofile.namespace().unwrap_or_else(|| "default".to_string());

    error!(resource = %format!("{namespace}/{name}"), %error, "Reconciliation error");
    observability::metrics::increment_reconciliation_errors();

    let requeue = requeue_delay(error, &ctx, &namespace, &name);
    info!(
        resource = %format!("{namespace}/{name}"),
        reason = error.reason(),
        delay_secs = requeue.as_secs(),
        "Requeueing after error"
    );
    Action::requeue(requeue)
}

fn requeue_delay(
    error: &ReconcileError,
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Duration {
    match error {
        ReconcileError::InvalidSpec(_) => Duration::from_secs(INVALID_SPEC_REQUEUE_SECS),
        ReconcileError::CredentialMissing(_) => {
            Duration::from_secs(CREDENTIAL_MISSING_REQUEUE_SECS)
        }
        ReconcileError::ClusterConflict(_) => Duration::from_secs(CONFLICT_REQUEUE_SECS),
        ReconcileError::NotifyPartial { .. } | ReconcileError::NotifyTimeout { .. } => {
            Duration::from_secs(NOTIFY_FAILURE_REQUEUE_SECS)
        }
        ReconcileError::SourceUnavailable(_)
        | ReconcileError::Encoding(_)
        | ReconcileError::Kube(_) => ctx.next_backoff(namespace, name),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::constants::BACKOFF_START_SECS;

    use super::*;

    fn reconciler() -> Reconciler {
        // A client is only needed for API calls, which these tests never make
        let config = Config::default();
        Reconciler {
            client: kube::Client::try_from(
                kube::Config::new("http://localhost:8080".parse().unwrap()),
            )
            .unwrap(),
            notifier: crate::controller::reconciler::Notifier::new(
                kube::Client::try_from(kube::Config::new(
                    "http://localhost:8080".parse().unwrap(),
                ))
                .unwrap(),
                &config,
            )
            .unwrap(),
            config,
            backoff_states: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_invalid_spec_requeues_quietly() {
        let ctx = reconciler();
        let delay = requeue_delay(
            &ReconcileError::InvalidSpec("bad".into()),
            &ctx,
            "default",
            "site",
        );
        assert_eq!(delay, Duration::from_secs(INVALID_SPEC_REQUEUE_SECS));
    }

    #[tokio::test]
    async fn test_conflict_requeues_immediately() {
        let ctx = reconciler();
        let error = ReconcileError::ClusterConflict(kube::Error::Api(
            kube::core::ErrorResponse {
                status: "Failure".into(),
                message: "conflict".into(),
                reason: "Conflict".into(),
                code: 409,
            },
        ));
        let delay = requeue_delay(&error, &ctx, "default", "site");
        assert_eq!(delay, Duration::from_secs(CONFLICT_REQUEUE_SECS));
    }

    #[tokio::test]
    async fn test_source_unavailable_backs_off_per_resource() {
        let ctx = reconciler();
        let error = ReconcileError::SourceUnavailable("503".into());

        let first = requeue_delay(&error, &ctx, "default", "site");
        let second = requeue_delay(&error, &ctx, "default", "site");
        assert_eq!(first, Duration::from_secs(BACKOFF_START_SECS));
        assert_eq!(second, Duration::from_secs(BACKOFF_START_SECS * 2));

        // A different resource starts its own sequence
        let other = requeue_delay(&error, &ctx, "default", "other");
        assert_eq!(other, Duration::from_secs(BACKOFF_START_SECS));
    }

    #[tokio::test]
    async fn test_reset_clears_backoff_state() {
        let ctx = reconciler();
        let error = ReconcileError::SourceUnavailable("503".into());
        requeue_delay(&error, &ctx, "default", "site");
        requeue_delay(&error, &ctx, "default", "site");

        ctx.reset_backoff("default", "site");
        let delay = requeue_delay(&error, &ctx, "default", "site");
        assert_eq!(delay, Duration::from_secs(BACKOFF_START_SECS));
    }

    #[tokio::test]
    async fn test_notify_failures_requeue_bounded() {
        let ctx = reconciler();
        let delay = requeue_delay(
            &ReconcileError::NotifyTimeout {
                notified: 1,
                total: 4,
            },
            &ctx,
            "default",
            "site",
        );
        assert_eq!(delay, Duration::from_secs(NOTIFY_FAILURE_REQUEUE_SECS));
    }
}
