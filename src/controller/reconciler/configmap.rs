//! # ConfigMap Writer
//!
//! Creates or updates the ConfigMap owned by a Decofile, with change
//! detection over the raw stored strings. Deep JSON comparison is avoided
//! on purpose: formatting differences would produce false positives and
//! changes buried inside Brotli output would produce false negatives.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, info};

use crate::constants::TIMESTAMP_KEY;
use crate::crd::Decofile;

use super::encoding::ContentKey;
use super::types::ReconcileError;

/// What the upsert did to the stored ConfigMap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The ConfigMap did not exist and was created. No notification: no pod
    /// can be bound to a ConfigMap created this reconcile turn; pods read
    /// the mounted file on startup.
    CreatedNew,
    /// Content changed under the same encoding key
    RewrittenSameEncoding,
    /// The document crossed the compression threshold and switched keys
    RewrittenEncodingSwitched,
    /// Stored content already matches; the existing timestamp is preserved
    Unchanged,
}

impl ChangeKind {
    /// Whether this change warrants a reload fan-out
    #[must_use]
    pub fn requires_notification(&self) -> bool {
        matches!(
            self,
            ChangeKind::RewrittenSameEncoding | ChangeKind::RewrittenEncodingSwitched
        )
    }
}

/// Result of an upsert: what changed, and the content timestamp now stored
#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub change: ChangeKind,
    pub timestamp: u64,
}

/// Deterministic ConfigMap name for a Decofile
#[must_use]
pub fn configmap_name(decofile_name: &str) -> String {
    format!("decofile-{decofile_name}")
}

/// Create or update the owned ConfigMap for the encoded document.
pub async fn upsert(
    client: &Client,
    decofile: &Decofile,
    content_key: ContentKey,
    content: String,
) -> Result<UpsertOutcome, ReconcileError> {
    let namespace = decofile.namespace().unwrap_or_else(|| "default".to_string());
    let name = configmap_name(&decofile.name_any());
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);

    let Some(mut existing) = api.get_opt(&name).await? else {
        let timestamp = unix_now();
        let mut data = BTreeMap::new();
        data.insert(content_key.key().to_string(), content);
        data.insert(TIMESTAMP_KEY.to_string(), timestamp.to_string());

        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace),
                owner_references: decofile.controller_owner_ref(&()).map(|r| vec![r]),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };

        info!(configmap = %name, timestamp, "Creating ConfigMap");
        api.create(&PostParams::default(), &configmap)
            .await
            .map_err(ReconcileError::from_write)?;

        return Ok(UpsertOutcome {
            change: ChangeKind::CreatedNew,
            timestamp,
        });
    };

    let data = existing.data.clone().unwrap_or_default();
    let existing_key = ContentKey::from_data(&data);
    let previous_timestamp = data
        .get(TIMESTAMP_KEY)
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let change = classify_change(
        existing_key,
        content_key,
        data.get(existing_key.key()).map(String::as_str),
        &content,
    );

    if change == ChangeKind::Unchanged {
        debug!(configmap = %name, "ConfigMap content unchanged, keeping existing timestamp");
        return Ok(UpsertOutcome {
            change,
            timestamp: previous_timestamp,
        });
    }

    if change == ChangeKind::RewrittenEncodingSwitched {
        info!(
            configmap = %name,
            from = existing_key.key(),
            to = content_key.key(),
            "ConfigMap encoding switched"
        );
    }

    let timestamp = next_timestamp(previous_timestamp);
    let mut data = BTreeMap::new();
    data.insert(content_key.key().to_string(), content);
    data.insert(TIMESTAMP_KEY.to_string(), timestamp.to_string());
    existing.data = Some(data);
    if existing
        .metadata
        .owner_references
        .as_ref()
        .is_none_or(|refs| refs.is_empty())
    {
        existing.metadata.owner_references = decofile.controller_owner_ref(&()).map(|r| vec![r]);
    }

    info!(configmap = %name, timestamp, "ConfigMap content changed, updating");
    api.replace(&name, &PostParams::default(), &existing)
        .await
        .map_err(ReconcileError::from_write)?;

    Ok(UpsertOutcome { change, timestamp })
}

/// Classify what a write would change, comparing raw stored strings under
/// the selected key and detecting encoding switches.
fn classify_change(
    existing_key: ContentKey,
    new_key: ContentKey,
    existing_content: Option<&str>,
    new_content: &str,
) -> ChangeKind {
    if existing_key != new_key {
        return ChangeKind::RewrittenEncodingSwitched;
    }
    if existing_content == Some(new_content) {
        ChangeKind::Unchanged
    } else {
        ChangeKind::RewrittenSameEncoding
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Content timestamps must strictly increase on every change, even when two
/// changes land within the same wall-clock second.
fn next_timestamp(previous: u64) -> u64 {
    unix_now().max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configmap_name_is_deterministic() {
        assert_eq!(configmap_name("storefront"), "decofile-storefront");
        assert_eq!(configmap_name("storefront"), configmap_name("storefront"));
    }

    #[test]
    fn test_classify_same_content_unchanged() {
        let change = classify_change(
            ContentKey::Json,
            ContentKey::Json,
            Some("{\"a\":1}"),
            "{\"a\":1}",
        );
        assert_eq!(change, ChangeKind::Unchanged);
        assert!(!change.requires_notification());
    }

    #[test]
    fn test_classify_content_change() {
        let change = classify_change(
            ContentKey::Json,
            ContentKey::Json,
            Some("{\"a\":1}"),
            "{\"a\":2}",
        );
        assert_eq!(change, ChangeKind::RewrittenSameEncoding);
        assert!(change.requires_notification());
    }

    #[test]
    fn test_classify_encoding_switch_wins() {
        // A switch counts as a change even if the bytes happen to match
        let change = classify_change(ContentKey::Json, ContentKey::Bin, Some("AAAA"), "AAAA");
        assert_eq!(change, ChangeKind::RewrittenEncodingSwitched);
        assert!(change.requires_notification());
    }

    #[test]
    fn test_classify_missing_existing_content() {
        let change = classify_change(ContentKey::Json, ContentKey::Json, None, "{}");
        assert_eq!(change, ChangeKind::RewrittenSameEncoding);
    }

    #[test]
    fn test_created_new_never_notifies() {
        assert!(!ChangeKind::CreatedNew.requires_notification());
    }

    #[test]
    fn test_next_timestamp_strictly_increases() {
        let now = unix_now();
        assert!(next_timestamp(0) >= now);
        // A previous stamp from this second still moves forward
        assert_eq!(next_timestamp(now), now + 1);
        // A previous stamp from the future is never rewound
        assert_eq!(next_timestamp(now + 100), now + 101);
    }
}
