//! # Status Updates
//!
//! Writes Decofile status with a read-before-write pattern: the resource is
//! re-fetched immediately before each patch so a status write never clobbers
//! changes made while the reconcile was running.

use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

use crate::crd::{Decofile, DecofileStatus};

use super::types::ReconcileError;

/// Field manager used for status patches
const FIELD_MANAGER: &str = "decofile-operator";

/// Re-fetch the Decofile and patch its status through `mutate`.
///
/// A resource deleted mid-reconcile is not an error; there is nothing left
/// to report on.
pub async fn update_status<F>(
    client: &Client,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<(), ReconcileError>
where
    F: FnOnce(&mut DecofileStatus),
{
    let api: Api<Decofile> = Api::namespaced(client.clone(), namespace);
    let Some(fresh) = api.get_opt(name).await? else {
        return Ok(());
    };

    let mut status = fresh.status.clone().unwrap_or_default();
    mutate(&mut status);

    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await
        .map_err(ReconcileError::from_write)?;
    Ok(())
}

/// Machine-parseable identifier of the configuration generation a
/// notification reports on: the archive commit when one exists, otherwise
/// the content timestamp.
#[must_use]
pub fn generation_identifier(revision: Option<&str>, timestamp: u64) -> String {
    match revision {
        Some(revision) => format!("commit:{revision}"),
        None => format!("timestamp:{timestamp}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_identifier_prefers_commit() {
        assert_eq!(
            generation_identifier(Some("deadbeef"), 1700000000),
            "commit:deadbeef"
        );
    }

    #[test]
    fn test_generation_identifier_falls_back_to_timestamp() {
        assert_eq!(
            generation_identifier(None, 1700000000),
            "timestamp:1700000000"
        );
    }
}
