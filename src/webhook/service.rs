//! # Service Mutation Webhook
//!
//! Handles AdmissionReview requests for Knative Services, injecting the
//! bound Decofile's ConfigMap as a read-only file volume together with the
//! consumer environment variables and the pod label the notifier selects on.
//!
//! The handler mutates a copy of the raw admission object and responds with
//! the JSON patch between the two, so fields this operator does not know
//! about pass through untouched.

use std::sync::Arc;

use axum::{extract::State, Json};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DynamicObject, ListParams};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::{Api, Client, ResourceExt};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::constants::{
    APP_CONTAINER_NAME, DECOFILE_LABEL, DECOFILE_VOLUME_NAME, DECO_RELEASE_ENV, DEFAULT_MOUNT_DIR,
    DEPLOYMENT_ID_LABEL, INJECT_ANNOTATION, MOUNT_PATH_ANNOTATION, RELOAD_TOKEN_ENV,
};
use crate::crd::Decofile;

use super::WebhookState;

/// Handle mutating admission review for Knative Services
pub async fn mutate_handler(
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

    let response = mutate_service(&state, &request).await;
    Json(response.into_review())
}

/// Process a single Service mutation request
async fn mutate_service(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let Some(service) = &request.object else {
        debug!("No service object in request, allowing unchanged");
        return response;
    };
    let service_name = service.name_any();

    if service.annotations().get(INJECT_ANNOTATION).map(String::as_str) != Some("true") {
        debug!(service = %service_name, "No injection annotation, allowing unchanged");
        return response;
    }

    let Some(deployment_id) = service
        .labels()
        .get(DEPLOYMENT_ID_LABEL)
        .filter(|id| !id.is_empty())
        .cloned()
    else {
        warn!(service = %service_name, "Injection requested but deploymentId label is missing");
        return response.deny(format!(
            "service has {INJECT_ANNOTATION} annotation but no {DEPLOYMENT_ID_LABEL} label"
        ));
    };

    let namespace = service
        .namespace()
        .or_else(|| request.namespace.clone())
        .unwrap_or_else(|| "default".to_string());

    // Binding resolution is non-blocking: workload creation must never wait
    // on operator lag
    let decofile = match find_decofile(&state.kube, &namespace, &deployment_id).await {
        Ok(Some(decofile)) => decofile,
        Ok(None) => {
            info!(
                service = %service_name,
                deployment_id = %deployment_id,
                "No matching Decofile, admitting Service without injection"
            );
            return response;
        }
        Err(e) => {
            warn!(
                service = %service_name,
                error = %e,
                "Failed to list Decofiles, admitting Service without injection"
            );
            return response;
        }
    };

    let Some(config_map_name) = decofile
        .status
        .as_ref()
        .and_then(|status| status.config_map_name.clone())
        .filter(|name| !name.is_empty())
    else {
        info!(
            service = %service_name,
            decofile = %decofile.name_any(),
            "Decofile ConfigMap not ready yet, admitting Service without injection"
        );
        return response;
    };

    let extension = configmap_extension(&state.kube, &namespace, &config_map_name).await;
    let mount_dir = service
        .annotations()
        .get(MOUNT_PATH_ANNOTATION)
        .cloned()
        .unwrap_or_else(|| DEFAULT_MOUNT_DIR.to_string());

    let original = match serde_json::to_value(service) {
        Ok(value) => value,
        Err(e) => {
            error!(service = %service_name, error = %e, "Failed to serialize service");
            return response.deny(format!("failed to serialize service: {e}"));
        }
    };
    let mut mutated = original.clone();
    if let Err(e) = inject_decofile(
        &mut mutated,
        &config_map_name,
        &mount_dir,
        extension,
        &deployment_id,
    ) {
        error!(service = %service_name, error = %e, "Failed to inject Decofile");
        return response.deny(e);
    }

    let patch = json_patch::diff(&original, &mutated);
    if patch.0.is_empty() {
        debug!(service = %service_name, "Service already injected, nothing to patch");
        return response;
    }

    info!(
        service = %service_name,
        deployment_id = %deployment_id,
        configmap = %config_map_name,
        patch_ops = patch.0.len(),
        "Injecting Decofile into Service"
    );

    match response.with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(service = %service_name, error = %e, "Failed to serialize patch");
            AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
        }
    }
}

/// Find the Decofile in `namespace` whose effective deployment id matches.
async fn find_decofile(
    client: &Client,
    namespace: &str,
    deployment_id: &str,
) -> Result<Option<Decofile>, kube::Error> {
    let api: Api<Decofile> = Api::namespaced(client.clone(), namespace);
    let list = api.list(&ListParams::default()).await?;
    Ok(list
        .items
        .into_iter()
        .find(|decofile| decofile.effective_deployment_id() == deployment_id))
}

/// Inspect the live ConfigMap to match the consumer env var to the stored
/// encoding. Defaults to the plain variant when the ConfigMap is unreadable.
async fn configmap_extension(client: &Client, namespace: &str, name: &str) -> &'static str {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    match api.get_opt(name).await {
        Ok(Some(configmap)) => {
            let data = configmap.data.unwrap_or_default();
            crate::controller::reconciler::ContentKey::from_data(&data).extension()
        }
        _ => "json",
    }
}

/// Apply the Decofile mutation to a raw Service object. Upsert semantics
/// throughout: pre-existing volumes, mounts and env vars of the same name
/// are updated in place, never duplicated.
pub fn inject_decofile(
    service: &mut Value,
    config_map_name: &str,
    mount_dir: &str,
    extension: &str,
    deployment_id: &str,
) -> Result<(), String> {
    // Pod-template label so the notifier's selector finds the pods; Knative
    // label propagation is not relied on
    let labels = ensure_object(service, &["spec", "template", "metadata", "labels"])?;
    labels.insert(
        DECOFILE_LABEL.to_string(),
        Value::String(deployment_id.to_string()),
    );

    let volumes = ensure_array(service, &["spec", "template", "spec", "volumes"])?;
    let volume = serde_json::json!({
        "name": DECOFILE_VOLUME_NAME,
        "configMap": { "name": config_map_name },
    });
    match volumes
        .iter_mut()
        .find(|existing| existing["name"] == DECOFILE_VOLUME_NAME)
    {
        Some(existing) => *existing = volume,
        None => volumes.push(volume),
    }

    let containers = service
        .pointer_mut("/spec/template/spec/containers")
        .and_then(Value::as_array_mut)
        .filter(|containers| !containers.is_empty())
        .ok_or_else(|| "no containers found in Service spec".to_string())?;
    let index = containers
        .iter()
        .position(|container| container["name"] == APP_CONTAINER_NAME)
        .unwrap_or(0);
    let container = containers[index]
        .as_object_mut()
        .ok_or_else(|| "container entry is not an object".to_string())?;

    upsert_volume_mount(container, mount_dir);
    upsert_env(container, mount_dir, extension);

    Ok(())
}

fn upsert_volume_mount(container: &mut serde_json::Map<String, Value>, mount_dir: &str) {
    let mounts = container
        .entry("volumeMounts".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(mounts) = mounts.as_array_mut() else {
        return;
    };

    match mounts
        .iter_mut()
        .find(|mount| mount["name"] == DECOFILE_VOLUME_NAME)
    {
        Some(mount) => {
            mount["mountPath"] = Value::String(mount_dir.to_string());
            mount["readOnly"] = Value::Bool(true);
            if let Some(mount) = mount.as_object_mut() {
                mount.remove("subPath");
            }
        }
        None => mounts.push(serde_json::json!({
            "name": DECOFILE_VOLUME_NAME,
            "mountPath": mount_dir,
            "readOnly": true,
        })),
    }
}

fn upsert_env(container: &mut serde_json::Map<String, Value>, mount_dir: &str, extension: &str) {
    let env = container
        .entry("env".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(env) = env.as_array_mut() else {
        return;
    };

    let release_value = format!("file://{mount_dir}/decofile.{extension}");
    match env.iter_mut().find(|var| var["name"] == DECO_RELEASE_ENV) {
        Some(var) => var["value"] = Value::String(release_value),
        None => env.push(serde_json::json!({
            "name": DECO_RELEASE_ENV,
            "value": release_value,
        })),
    }

    // The reload token is a per-pod-template secret, not a per-request
    // nonce: an existing value must survive re-admission or every mutator
    // pass would churn the pods
    let existing_token = env
        .iter()
        .find(|var| var["name"] == RELOAD_TOKEN_ENV)
        .and_then(|var| var["value"].as_str())
        .filter(|value| !value.is_empty());
    if existing_token.is_none() {
        let token = uuid::Uuid::new_v4().to_string();
        match env.iter_mut().find(|var| var["name"] == RELOAD_TOKEN_ENV) {
            Some(var) => var["value"] = Value::String(token),
            None => env.push(serde_json::json!({
                "name": RELOAD_TOKEN_ENV,
                "value": token,
            })),
        }
    }
}

/// Navigate to a nested object, creating intermediate objects as needed.
fn ensure_object<'a>(
    root: &'a mut Value,
    path: &[&str],
) -> Result<&'a mut serde_json::Map<String, Value>, String> {
    let mut current = root;
    for part in path {
        let object = current
            .as_object_mut()
            .ok_or_else(|| format!("field {part} has a non-object parent"))?;
        current = object
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    current
        .as_object_mut()
        .ok_or_else(|| format!("field {} is not an object", path.join(".")))
}

/// Navigate to a nested array, creating it (and intermediate objects) as
/// needed.
fn ensure_array<'a>(root: &'a mut Value, path: &[&str]) -> Result<&'a mut Vec<Value>, String> {
    let (last, parents) = path
        .split_last()
        .ok_or_else(|| "empty path".to_string())?;
    let parent = ensure_object(root, parents)?;
    parent
        .entry((*last).to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| format!("field {last} is not an array"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_service() -> Value {
        serde_json::json!({
            "apiVersion": "serving.knative.dev/v1",
            "kind": "Service",
            "metadata": {
                "name": "storefront",
                "namespace": "sites",
                "annotations": { INJECT_ANNOTATION: "true" },
                "labels": { DEPLOYMENT_ID_LABEL: "site-42" },
            },
            "spec": {
                "template": {
                    "spec": {
                        "containers": [
                            { "name": "app", "image": "site:latest" },
                        ],
                    },
                },
            },
        })
    }

    fn container(service: &Value) -> &Value {
        &service["spec"]["template"]["spec"]["containers"][0]
    }

    #[test]
    fn test_inject_adds_volume_mount_env_and_label() {
        let mut service = sample_service();
        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let volumes = service["spec"]["template"]["spec"]["volumes"]
            .as_array()
            .unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0]["configMap"]["name"], "decofile-storefront");

        let container = container(&service);
        assert_eq!(container["volumeMounts"][0]["mountPath"], DEFAULT_MOUNT_DIR);
        assert_eq!(container["volumeMounts"][0]["readOnly"], true);

        let env = container["env"].as_array().unwrap();
        let release = env.iter().find(|e| e["name"] == DECO_RELEASE_ENV).unwrap();
        assert_eq!(release["value"], "file:///app/decofile/decofile.json");
        assert!(env.iter().any(|e| e["name"] == RELOAD_TOKEN_ENV));

        assert_eq!(
            service["spec"]["template"]["metadata"]["labels"][DECOFILE_LABEL],
            "site-42"
        );
    }

    #[test]
    fn test_inject_is_idempotent() {
        let mut service = sample_service();
        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();
        let after_first = service.clone();
        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        assert_eq!(service, after_first);
        let container = container(&service);
        assert_eq!(container["volumeMounts"].as_array().unwrap().len(), 1);
        assert_eq!(container["env"].as_array().unwrap().len(), 2);
        assert_eq!(
            service["spec"]["template"]["spec"]["volumes"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_inject_preserves_existing_reload_token() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["containers"][0]["env"] = serde_json::json!([
            { "name": RELOAD_TOKEN_ENV, "value": "existing-token" },
        ]);

        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let env = container(&service)["env"].as_array().unwrap();
        let token = env.iter().find(|e| e["name"] == RELOAD_TOKEN_ENV).unwrap();
        assert_eq!(token["value"], "existing-token");
    }

    #[test]
    fn test_inject_regenerates_empty_token() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["containers"][0]["env"] = serde_json::json!([
            { "name": RELOAD_TOKEN_ENV, "value": "" },
        ]);

        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let env = container(&service)["env"].as_array().unwrap();
        let token = env.iter().find(|e| e["name"] == RELOAD_TOKEN_ENV).unwrap();
        assert_ne!(token["value"], "");
    }

    #[test]
    fn test_inject_targets_app_container() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["containers"] = serde_json::json!([
            { "name": "sidecar", "image": "proxy:latest" },
            { "name": "app", "image": "site:latest" },
        ]);

        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let containers = service["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        assert!(containers[0].get("volumeMounts").is_none());
        assert!(containers[1].get("volumeMounts").is_some());
    }

    #[test]
    fn test_inject_falls_back_to_first_container() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["containers"] = serde_json::json!([
            { "name": "web", "image": "site:latest" },
        ]);

        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let container = container(&service);
        assert!(container.get("volumeMounts").is_some());
    }

    #[test]
    fn test_inject_honors_custom_mount_dir_and_bin_extension() {
        let mut service = sample_service();
        inject_decofile(&mut service, "decofile-storefront", "/etc/deco", "bin", "site-42")
            .unwrap();

        let container = container(&service);
        assert_eq!(container["volumeMounts"][0]["mountPath"], "/etc/deco");
        let env = container["env"].as_array().unwrap();
        let release = env.iter().find(|e| e["name"] == DECO_RELEASE_ENV).unwrap();
        assert_eq!(release["value"], "file:///etc/deco/decofile.bin");
    }

    #[test]
    fn test_inject_clears_subpath_on_existing_mount() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["containers"][0]["volumeMounts"] = serde_json::json!([
            { "name": DECOFILE_VOLUME_NAME, "mountPath": "/old", "subPath": "nested" },
        ]);

        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let mount = &container(&service)["volumeMounts"][0];
        assert_eq!(mount["mountPath"], DEFAULT_MOUNT_DIR);
        assert!(mount.get("subPath").is_none());
    }

    #[test]
    fn test_inject_rewrites_foreign_volume_source() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["volumes"] = serde_json::json!([
            { "name": DECOFILE_VOLUME_NAME, "configMap": { "name": "stale-configmap" } },
        ]);

        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let volumes = service["spec"]["template"]["spec"]["volumes"]
            .as_array()
            .unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0]["configMap"]["name"], "decofile-storefront");
    }

    #[test]
    fn test_inject_fails_without_containers() {
        let mut service = sample_service();
        service["spec"]["template"]["spec"]["containers"] = serde_json::json!([]);

        let error = inject_decofile(
            &mut service,
            "decofile-storefront",
            DEFAULT_MOUNT_DIR,
            "json",
            "site-42",
        )
        .unwrap_err();
        assert!(error.contains("no containers"));
    }

    #[test]
    fn test_patch_is_empty_for_already_injected_service() {
        let mut service = sample_service();
        inject_decofile(&mut service, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let original = service.clone();
        let mut mutated = service.clone();
        inject_decofile(&mut mutated, "decofile-storefront", DEFAULT_MOUNT_DIR, "json", "site-42")
            .unwrap();

        let patch = json_patch::diff(&original, &mutated);
        assert!(patch.0.is_empty());
    }
}
