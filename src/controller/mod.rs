//! # Controller
//!
//! Reconciliation machinery for Decofile resources:
//!
//! - `source` - pluggable retrieval of the configuration document
//! - `reconciler` - the reconcile loop, ConfigMap writer and pod notifier
//! - `backoff` - exponential backoff calculator for transient failures
//! - `error_policy` - error classification and requeue decisions

pub mod backoff;
pub mod error_policy;
pub mod reconciler;
pub mod source;
