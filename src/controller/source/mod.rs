//! # Source Adapters
//!
//! Pluggable retrieval of the configuration document for a Decofile.
//!
//! Each adapter normalizes its input to a single JSON object mapping
//! canonical keys (filenames with any `.json` suffix stripped) to
//! already-parsed JSON values, serialized compactly. `serde_json` never
//! HTML-escapes `&`, `<` or `>`, so reserved characters survive verbatim.

mod archive;
mod github;
mod inline;

pub use github::GitHubDecofileSource;
pub use inline::InlineDecofileSource;

use async_trait::async_trait;
use kube::Client;
use kube::ResourceExt;

use crate::config::Config;
use crate::controller::reconciler::ReconcileError;
use crate::crd::{Decofile, SourceType};

/// A retrieved configuration document, normalized to a single JSON object
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Compact JSON text of the document
    pub json: String,
    /// Commit identifier, present for archive sources
    pub revision: Option<String>,
}

/// Capability for retrieving configuration data from a source
#[async_trait]
pub trait DecofileSource: Send + Sync {
    /// Fetch the configuration data as a single normalized JSON document
    async fn retrieve(&self) -> Result<SourceDocument, ReconcileError>;

    /// The source variant this adapter implements
    fn kind(&self) -> SourceType;
}

/// Select the adapter implementation for a Decofile spec.
///
/// A discriminator pointing at missing payload data fails with `InvalidSpec`
/// so the resource is not requeued aggressively.
pub fn new_source(
    client: Client,
    config: &Config,
    decofile: &Decofile,
) -> Result<Box<dyn DecofileSource>, ReconcileError> {
    match decofile.spec.source {
        SourceType::Inline => {
            let inline = decofile.spec.inline.as_ref().ok_or_else(|| {
                ReconcileError::InvalidSpec(
                    "inline source specified but no inline data provided".to_string(),
                )
            })?;
            Ok(Box::new(InlineDecofileSource::new(inline.clone())))
        }
        SourceType::Github => {
            let github = decofile.spec.github.as_ref().ok_or_else(|| {
                ReconcileError::InvalidSpec(
                    "github source specified but no github config provided".to_string(),
                )
            })?;
            let namespace = decofile.namespace().unwrap_or_else(|| "default".to_string());
            Ok(Box::new(GitHubDecofileSource::new(
                client,
                github.clone(),
                namespace,
                config.github_token.clone(),
            )?))
        }
    }
}

/// Canonicalize a document key by stripping a trailing `.json` suffix.
pub(crate) fn strip_json_suffix(key: &str) -> &str {
    key.strip_suffix(".json").unwrap_or(key)
}

/// Serialize a document map compactly.
pub(crate) fn serialize_document(
    document: serde_json::Map<String, serde_json::Value>,
) -> Result<String, ReconcileError> {
    serde_json::to_string(&serde_json::Value::Object(document))
        .map_err(|e| ReconcileError::Encoding(format!("failed to serialize document: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_suffix() {
        assert_eq!(strip_json_suffix("pages.json"), "pages");
        assert_eq!(strip_json_suffix("pages"), "pages");
        assert_eq!(strip_json_suffix("pages.yaml"), "pages.yaml");
        assert_eq!(strip_json_suffix(".json"), "");
    }

    #[test]
    fn test_strip_json_suffix_only_trailing() {
        assert_eq!(strip_json_suffix("a.json.bak"), "a.json.bak");
    }

    #[test]
    fn test_serialize_document_no_html_escaping() {
        let mut document = serde_json::Map::new();
        document.insert(
            "page".to_string(),
            serde_json::json!({"html": "<b>Tom & Jerry</b>"}),
        );
        let json = serialize_document(document).unwrap();
        assert!(json.contains("<b>Tom & Jerry</b>"));
        assert!(!json.contains("\\u003c"));
        assert!(!json.contains("\\u0026"));
    }
}
