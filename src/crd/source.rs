//! # Source Configuration
//!
//! Payload types for the two Decofile source variants.

use std::collections::BTreeMap;

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Discriminator for the configuration source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Direct JSON values embedded in the Decofile spec
    Inline,
    /// A directory inside a GitHub repository archive
    Github,
}

impl SourceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Inline => "inline",
            SourceType::Github => "github",
        }
    }
}

/// Direct JSON configuration values
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InlineSource {
    /// Map of filename to arbitrary JSON value. Each key becomes a top-level
    /// key of the emitted document with any `.json` suffix stripped.
    #[schemars(schema_with = "arbitrary_object_schema")]
    pub value: BTreeMap<String, serde_json::Value>,
}

/// GitHub repository reference
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitHubSource {
    /// GitHub organization or user
    pub org: String,
    /// Repository name
    pub repo: String,
    /// Commit SHA or ref to fetch
    pub commit: String,
    /// Directory path within the repository
    pub path: String,
    /// Name of a secret in the same namespace whose `token` key holds the
    /// fetch credential. Falls back to the `GITHUB_TOKEN` environment
    /// variable, then to unauthenticated access for public repositories.
    #[serde(default)]
    pub secret: Option<String>,
}

/// The inline value map holds arbitrary user JSON, so the generated CRD
/// schema must not constrain its fields.
fn arbitrary_object_schema(_gen: &mut SchemaGenerator) -> Schema {
    let schema_value = serde_json::json!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true,
        "description": "Map of filename to arbitrary JSON value",
    });
    serde_json::from_value(schema_value).expect("Failed to create Schema for inline value map")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SourceType::Inline).unwrap(),
            "\"inline\""
        );
        assert_eq!(
            serde_json::to_string(&SourceType::Github).unwrap(),
            "\"github\""
        );
    }

    #[test]
    fn test_source_type_roundtrip() {
        let parsed: SourceType = serde_json::from_str("\"github\"").unwrap();
        assert_eq!(parsed, SourceType::Github);
        assert_eq!(parsed.as_str(), "github");
    }

    #[test]
    fn test_github_source_secret_optional() {
        let source: GitHubSource = serde_json::from_value(serde_json::json!({
            "org": "deco-sites",
            "repo": "storefront",
            "commit": "abc123",
            "path": ".deco/blocks",
        }))
        .unwrap();
        assert!(source.secret.is_none());
    }

    #[test]
    fn test_inline_source_preserves_arbitrary_values() {
        let source: InlineSource = serde_json::from_value(serde_json::json!({
            "value": {
                "a.json": {"x": 1},
                "b": [1, 2, 3],
            }
        }))
        .unwrap();
        assert_eq!(source.value.len(), 2);
        assert_eq!(source.value["a.json"]["x"], 1);
    }
}
