//! # Reconciler Types
//!
//! Shared context and the error taxonomy of the reconcile loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use kube::Client;
use thiserror::Error;

use crate::config::Config;
use crate::constants::{BACKOFF_MAX_SECS, BACKOFF_START_SECS};
use crate::controller::backoff::ExponentialBackoff;

use super::notifier::Notifier;

/// Error kinds surfaced by reconciliation.
///
/// The kind determines both the `Ready` condition reason and the requeue
/// strategy applied by the error policy.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed Decofile spec or binding metadata; the user has to fix it
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Archive server or network failure; retried with backoff
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Referenced credential secret absent or lacking the `token` key
    #[error("credential missing: {0}")]
    CredentialMissing(String),

    /// Compression or serialization failure
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Optimistic-concurrency conflict on a write; requeued immediately
    #[error("cluster conflict: {0}")]
    ClusterConflict(#[source] kube::Error),

    /// Fan-out completed with per-pod failures
    #[error("failed to notify {failed} pod(s): {detail}")]
    NotifyPartial { failed: usize, detail: String },

    /// Fan-out deadline elapsed before all pods were reached
    #[error("notification deadline exceeded: notified {notified}/{total} pods")]
    NotifyTimeout { notified: usize, total: usize },

    /// Any other Kubernetes API failure
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcileError {
    /// Classify a write error, separating optimistic-concurrency conflicts
    /// from other API failures.
    #[must_use]
    pub fn from_write(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 409 => {
                ReconcileError::ClusterConflict(error)
            }
            _ => ReconcileError::Kube(error),
        }
    }

    /// Condition reason string for this error kind
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::InvalidSpec(_) => "InvalidSpec",
            ReconcileError::SourceUnavailable(_) => "SourceUnavailable",
            ReconcileError::CredentialMissing(_) => "CredentialMissing",
            ReconcileError::Encoding(_) => "EncodingError",
            ReconcileError::ClusterConflict(_) => "ClusterConflict",
            ReconcileError::NotifyPartial { .. } => "NotifyPartial",
            ReconcileError::NotifyTimeout { .. } => "NotifyTimeout",
            ReconcileError::Kube(_) => "ApiError",
        }
    }
}

/// Backoff state for a specific resource, keyed `namespace/name`
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backoff: ExponentialBackoff::new(BACKOFF_START_SECS, BACKOFF_MAX_SECS),
            error_count: 0,
        }
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared reconciler context passed to every reconcile invocation
pub struct Reconciler {
    pub client: Client,
    pub config: Config,
    pub notifier: Notifier,
    /// Backoff state per resource; lives here rather than in the reconcile
    /// path so a failing resource never blocks the watch stream
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(client: Client, config: Config) -> Result<Self> {
        let notifier = Notifier::new(client.clone(), &config)?;
        Ok(Self {
            client,
            config,
            notifier,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Advance and return the backoff for a resource after a transient error.
    pub fn next_backoff(&self, namespace: &str, name: &str) -> Duration {
        let key = format!("{namespace}/{name}");
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key).or_default();
                state.error_count += 1;
                state.backoff.next_backoff()
            }
            Err(_) => Duration::from_secs(BACKOFF_START_SECS),
        }
    }

    /// Clear the backoff state after a successful reconcile.
    pub fn reset_backoff(&self, namespace: &str, name: &str) {
        let key = format!("{namespace}/{name}");
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reasons() {
        assert_eq!(ReconcileError::InvalidSpec("x".into()).reason(), "InvalidSpec");
        assert_eq!(
            ReconcileError::SourceUnavailable("x".into()).reason(),
            "SourceUnavailable"
        );
        assert_eq!(
            ReconcileError::NotifyPartial {
                failed: 1,
                detail: "pod-a: timeout".into()
            }
            .reason(),
            "NotifyPartial"
        );
    }

    #[test]
    fn test_notify_partial_message_lists_causes() {
        let error = ReconcileError::NotifyPartial {
            failed: 2,
            detail: "pod-a: status 500; pod-b: request failed".into(),
        };
        let message = error.to_string();
        assert!(message.contains("2 pod(s)"));
        assert!(message.contains("pod-a: status 500"));
    }

    #[test]
    fn test_notify_timeout_message_carries_counts() {
        let error = ReconcileError::NotifyTimeout {
            notified: 3,
            total: 5,
        };
        assert!(error.to_string().contains("3/5"));
    }
}
