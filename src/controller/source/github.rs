//! # GitHub Source
//!
//! Builds the configuration document from a repository snapshot. The fetch
//! credential comes from the referenced secret's `token` key, falling back
//! to a process-wide token, then to unauthenticated access for public
//! repositories.

use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::{debug, info};

use crate::controller::reconciler::ReconcileError;
use crate::crd::{GitHubSource, SourceType};

use super::{archive, serialize_document, strip_json_suffix, DecofileSource, SourceDocument};

/// Adapter for `source: github`
pub struct GitHubDecofileSource {
    client: Client,
    http: reqwest::Client,
    config: GitHubSource,
    namespace: String,
    fallback_token: Option<String>,
}

impl GitHubDecofileSource {
    pub fn new(
        client: Client,
        config: GitHubSource,
        namespace: String,
        fallback_token: Option<String>,
    ) -> Result<Self, ReconcileError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")
            .map_err(|e| ReconcileError::SourceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            http,
            config,
            namespace,
            fallback_token,
        })
    }

    /// Resolve the fetch credential: referenced secret first, then the
    /// process-wide fallback, then empty for public repositories.
    async fn resolve_token(&self) -> Result<String, ReconcileError> {
        let Some(secret_name) = self.config.secret.as_deref().filter(|s| !s.is_empty()) else {
            if self.fallback_token.is_some() {
                debug!("Using archive token from environment");
            }
            return Ok(self.fallback_token.clone().unwrap_or_default());
        };

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let secret = secrets.get_opt(secret_name).await?.ok_or_else(|| {
            ReconcileError::CredentialMissing(format!(
                "secret {secret_name} not found in namespace {}",
                self.namespace
            ))
        })?;

        let token = secret
            .data
            .as_ref()
            .and_then(|data| data.get("token"))
            .map(|bytes| String::from_utf8_lossy(&bytes.0).to_string())
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => {
                debug!("Using archive token from secret {}", secret_name);
                Ok(token)
            }
            None => Err(ReconcileError::CredentialMissing(format!(
                "secret {secret_name} does not contain 'token' key"
            ))),
        }
    }
}

#[async_trait]
impl DecofileSource for GitHubDecofileSource {
    async fn retrieve(&self) -> Result<SourceDocument, ReconcileError> {
        let token = self.resolve_token().await?;

        info!(
            org = %self.config.org,
            repo = %self.config.repo,
            commit = %self.config.commit,
            path = %self.config.path,
            "Downloading configuration from GitHub"
        );

        let zip_data = archive::download_zip(
            &self.http,
            &self.config.org,
            &self.config.repo,
            &self.config.commit,
            &token,
        )
        .await?;
        crate::observability::metrics::increment_archive_downloads();

        let files = archive::extract_entries(&zip_data, &self.config.path)?;

        let mut document = serde_json::Map::new();
        for (name, content) in files {
            let decoded = decode_entry_name(&name);
            let key = strip_json_suffix(&decoded).to_string();
            let value: serde_json::Value = serde_json::from_slice(&content).map_err(|e| {
                ReconcileError::InvalidSpec(format!("entry {decoded} is not valid JSON: {e}"))
            })?;
            document.insert(key, value);
        }

        info!(entries = document.len(), "Downloaded configuration from GitHub");

        Ok(SourceDocument {
            json: serialize_document(document)?,
            revision: Some(self.config.commit.clone()),
        })
    }

    fn kind(&self) -> SourceType {
        SourceType::Github
    }
}

/// Percent-decode an archive entry name, falling back to the raw name when
/// the escapes are malformed.
fn decode_entry_name(name: &str) -> String {
    match urlencoding::decode(name) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => name.to_string(),
    }
}
