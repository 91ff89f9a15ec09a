//! # Inline Source
//!
//! Builds the configuration document from JSON values embedded directly in
//! the Decofile spec.

use async_trait::async_trait;

use crate::controller::reconciler::ReconcileError;
use crate::crd::{InlineSource, SourceType};

use super::{serialize_document, strip_json_suffix, DecofileSource, SourceDocument};

/// Adapter for `source: inline`
pub struct InlineDecofileSource {
    config: InlineSource,
}

impl InlineDecofileSource {
    #[must_use]
    pub fn new(config: InlineSource) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DecofileSource for InlineDecofileSource {
    async fn retrieve(&self) -> Result<SourceDocument, ReconcileError> {
        let mut document = serde_json::Map::new();
        for (key, value) in &self.config.value {
            if value.is_null() {
                return Err(ReconcileError::InvalidSpec(format!(
                    "empty value for key {key}"
                )));
            }
            document.insert(strip_json_suffix(key).to_string(), value.clone());
        }

        Ok(SourceDocument {
            json: serialize_document(document)?,
            revision: None,
        })
    }

    fn kind(&self) -> SourceType {
        SourceType::Inline
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn source(entries: Vec<(&str, serde_json::Value)>) -> InlineDecofileSource {
        let value: BTreeMap<String, serde_json::Value> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        InlineDecofileSource::new(InlineSource { value })
    }

    #[tokio::test]
    async fn test_retrieve_strips_json_suffix() {
        let source = source(vec![("a.json", serde_json::json!({"x": 1}))]);
        let document = source.retrieve().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&document.json).unwrap();
        assert_eq!(parsed["a"]["x"], 1);
        assert!(parsed.get("a.json").is_none());
    }

    #[tokio::test]
    async fn test_retrieve_preserves_reserved_characters() {
        let source = source(vec![(
            "page",
            serde_json::json!({"markup": "<a href=\"?x=1&y=2\">go</a>"}),
        )]);
        let document = source.retrieve().await.unwrap();
        assert!(document.json.contains("<a href=\\\"?x=1&y=2\\\">go</a>"));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_null_value() {
        let source = source(vec![("a.json", serde_json::Value::Null)]);
        let error = source.retrieve().await.unwrap_err();
        assert!(matches!(error, ReconcileError::InvalidSpec(_)));
        assert!(error.to_string().contains("a.json"));
    }

    #[tokio::test]
    async fn test_retrieve_has_no_revision() {
        let source = source(vec![("a", serde_json::json!(1))]);
        let document = source.retrieve().await.unwrap();
        assert!(document.revision.is_none());
        assert_eq!(source.kind(), SourceType::Inline);
    }
}
