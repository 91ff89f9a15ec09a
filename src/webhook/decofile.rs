//! # Decofile Deletion Webhook
//!
//! Validates Decofile deletion: a Decofile still bound by an opted-in
//! Service may not be deleted. A failure to list Services fails open,
//! admitting the delete rather than orphaning cluster operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};
use kube::api::{DynamicObject, ListParams};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::ResourceExt;
use tracing::{error, info, warn};

use crate::constants::{DEPLOYMENT_ID_LABEL, INJECT_ANNOTATION};
use crate::crd::{knative_services, Decofile};

use super::WebhookState;

/// Handle validating admission review for Decofile deletion
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = validate_delete(&state, &request).await;
    Json(response.into_review())
}

/// Process a single Decofile deletion request
async fn validate_delete(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    if !matches!(request.operation, Operation::Delete) {
        return response;
    }

    // Deletion reviews carry the resource under oldObject
    let Some(object) = &request.old_object else {
        return response;
    };
    let decofile: Decofile = match serde_json::to_value(object).and_then(serde_json::from_value) {
        Ok(decofile) => decofile,
        Err(e) => {
            warn!(error = %e, "Could not decode Decofile under deletion, allowing");
            return response;
        }
    };

    let name = decofile.name_any();
    let namespace = decofile.namespace().unwrap_or_else(|| "default".to_string());
    let deployment_id = decofile.effective_deployment_id().to_string();

    info!(decofile = %name, namespace = %namespace, "Validating Decofile deletion");

    let services = knative_services(state.kube.clone(), &namespace);
    let list = match services.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            // Fail open: a transient list failure must not wedge deletions
            warn!(error = %e, "Failed to list Services during deletion validation, allowing");
            return response;
        }
    };

    let blocking: Vec<String> = list
        .items
        .iter()
        .filter(|service| {
            service_blocks_deletion(service.annotations(), service.labels(), &deployment_id)
        })
        .map(ResourceExt::name_any)
        .collect();

    if blocking.is_empty() {
        info!(decofile = %name, "Decofile deletion allowed - not in use");
        return response;
    }

    response.deny(format!(
        "cannot delete Decofile {name}: still in use by Service(s): {}. \
         Remove the {INJECT_ANNOTATION} annotation or delete the Service(s) first",
        blocking.join(", ")
    ))
}

/// Whether a Service with these annotations and labels pins the Decofile.
pub fn service_blocks_deletion(
    annotations: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
    deployment_id: &str,
) -> bool {
    annotations.get(INJECT_ANNOTATION).map(String::as_str) == Some("true")
        && labels.get(DEPLOYMENT_ID_LABEL).map(String::as_str) == Some(deployment_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bound_service_blocks_deletion() {
        let annotations = map(&[(INJECT_ANNOTATION, "true")]);
        let labels = map(&[(DEPLOYMENT_ID_LABEL, "site-42")]);
        assert!(service_blocks_deletion(&annotations, &labels, "site-42"));
    }

    #[test]
    fn test_service_without_injection_does_not_block() {
        let annotations = map(&[]);
        let labels = map(&[(DEPLOYMENT_ID_LABEL, "site-42")]);
        assert!(!service_blocks_deletion(&annotations, &labels, "site-42"));
    }

    #[test]
    fn test_injection_disabled_does_not_block() {
        let annotations = map(&[(INJECT_ANNOTATION, "false")]);
        let labels = map(&[(DEPLOYMENT_ID_LABEL, "site-42")]);
        assert!(!service_blocks_deletion(&annotations, &labels, "site-42"));
    }

    #[test]
    fn test_different_deployment_id_does_not_block() {
        let annotations = map(&[(INJECT_ANNOTATION, "true")]);
        let labels = map(&[(DEPLOYMENT_ID_LABEL, "other-site")]);
        assert!(!service_blocks_deletion(&annotations, &labels, "site-42"));
    }

    #[test]
    fn test_missing_label_does_not_block() {
        let annotations = map(&[(INJECT_ANNOTATION, "true")]);
        let labels = map(&[]);
        assert!(!service_blocks_deletion(&annotations, &labels, "site-42"));
    }
}
