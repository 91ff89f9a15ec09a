//! # Admission Webhooks
//!
//! Admission endpoints served alongside metrics and probes:
//!
//! - `POST /mutate-serving-knative-dev-v1-service` - injects the Decofile
//!   volume, mount, env vars and pod label into opted-in Knative Services
//! - `POST /validate-deco-sites-v1alpha1-decofile` - blocks deletion of a
//!   Decofile still bound by a Service
//!
//! TLS termination is an external concern; the cluster fronts these routes
//! with a certificate the operator never sees.

pub mod decofile;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Router};
use kube::Client;
use tower_http::timeout::TimeoutLayer;

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Kubernetes client for looking up Decofiles, ConfigMaps and Services
    pub kube: Client,
}

impl WebhookState {
    /// Create a new webhook state with the given Kubernetes client
    #[must_use]
    pub fn new(kube: Client) -> Self {
        Self { kube }
    }
}

/// Per-request deadline for admission handlers
const ADMISSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the webhook router with both admission endpoints
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            "/mutate-serving-knative-dev-v1-service",
            post(service::mutate_handler),
        )
        .route(
            "/validate-deco-sites-v1alpha1-decofile",
            post(decofile::validate_handler),
        )
        .layer(TimeoutLayer::new(ADMISSION_TIMEOUT))
        .with_state(state)
}
