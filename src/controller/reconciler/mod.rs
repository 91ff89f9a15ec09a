//! # Reconciler
//!
//! Core reconciliation logic for Decofile resources.
//!
//! The reconciler:
//! - Watches Decofile resources across all namespaces
//! - Retrieves the configuration document from the declared source
//! - Encodes it, compressing documents above the ConfigMap-safe threshold
//! - Writes the owned ConfigMap with deterministic change detection
//! - Notifies bound pods when the content changed
//! - Updates resource status with conditions and the generation identifier
//!
//! ## Reconciliation Flow
//!
//! 1. Fetch the Decofile (a missing resource means cascade cleanup is done)
//! 2. Resolve the source adapter
//! 3. Retrieve and normalize the document
//! 4. Encode (plain or Brotli+base64 above 2.5 MiB)
//! 5. Upsert the ConfigMap, capturing the change kind and timestamp
//! 6. Fan out reload notifications on content change (unless `silent`)
//! 7. Update status conditions

mod configmap;
mod encoding;
mod notifier;
mod reconcile;
mod status;
mod types;

pub use configmap::{configmap_name, ChangeKind, UpsertOutcome};
pub use encoding::{encode_document, ContentKey};
pub use notifier::{Notifier, NotifyOutcome};
pub use reconcile::reconcile;
pub use status::{generation_identifier, update_status};
pub use types::{BackoffState, ReconcileError, Reconciler};
