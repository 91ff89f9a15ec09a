//! # Decofile Operator
//!
//! A Kubernetes operator that materializes declarative configuration
//! resources (Decofiles) into ConfigMaps and live-reloads the workloads
//! consuming them.
//!
//! ## Overview
//!
//! 1. **Reconciliation** - Watches Decofile resources, retrieves content
//!    from the declared source (inline values or a GitHub repository
//!    snapshot), compresses documents above the ConfigMap-safe threshold,
//!    and writes an owned ConfigMap with deterministic change detection.
//! 2. **Admission mutation** - On Service create/update, injects the bound
//!    ConfigMap as a read-only file volume together with the consumer
//!    environment variables and a reload-authorization token.
//! 3. **Pod notification** - After a content change, fans out authenticated
//!    reload POSTs to every bound pod with bounded concurrency, retries and
//!    a global deadline.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod server;
pub mod webhook;
