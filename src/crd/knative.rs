//! # Knative Service Access
//!
//! The operator mutates and inspects `serving.knative.dev/v1` Services but
//! does not own their schema, so it goes through the dynamic API.

use kube::api::{Api, ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use kube::Client;

/// ApiResource descriptor for Knative Services
#[must_use]
pub fn knative_service_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("serving.knative.dev", "v1", "Service"))
}

/// Namespaced dynamic API for Knative Services
#[must_use]
pub fn knative_services(client: Client, namespace: &str) -> Api<DynamicObject> {
    Api::namespaced_with(client, namespace, &knative_service_resource())
}
