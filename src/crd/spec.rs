//! # Decofile Resource
//!
//! The Decofile custom resource declares a configuration source that the
//! operator materializes into a ConfigMap.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: deco.sites/v1alpha1
//! kind: Decofile
//! metadata:
//!   name: storefront
//!   namespace: sites
//! spec:
//!   source: inline
//!   inline:
//!     value:
//!       pages.json:
//!         home: { "title": "Hello" }
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::source::{GitHubSource, InlineSource, SourceType};
use super::status::DecofileStatus;

/// Desired state of a Decofile
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Decofile",
    group = "deco.sites",
    version = "v1alpha1",
    namespaced,
    status = "DecofileStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Source", "type":"string", "jsonPath":".status.sourceType"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DecofileSpec {
    /// Where the configuration document comes from
    pub source: SourceType,

    /// Binding alias used by Services. Defaults to the resource name.
    #[serde(default)]
    pub deployment_id: Option<String>,

    /// Suppress pod notification when the content changes
    #[serde(default)]
    pub silent: bool,

    /// Direct JSON values (used when source=inline)
    #[serde(default)]
    pub inline: Option<InlineSource>,

    /// Repository reference (used when source=github)
    #[serde(default)]
    pub github: Option<GitHubSource>,
}

impl Decofile {
    /// The deployment id Services bind against: `spec.deploymentId`, or the
    /// resource name when unset or empty.
    #[must_use]
    pub fn effective_deployment_id(&self) -> &str {
        match self.spec.deployment_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => self.metadata.name.as_deref().unwrap_or_default(),
        }
    }
}
