//! # Custom Resource Definitions
//!
//! CRD types for the Decofile operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The Decofile resource and its spec
//! - `source.rs` - Source variant payloads (inline values, GitHub reference)
//! - `status.rs` - Status types and condition helpers
//! - `knative.rs` - Dynamic access to Knative Services (not owned by this operator)

mod knative;
mod source;
mod spec;
mod status;

pub use knative::{knative_service_resource, knative_services};
pub use source::{GitHubSource, InlineSource, SourceType};
pub use spec::{Decofile, DecofileSpec};
pub use status::{Condition, DecofileStatus, CONDITION_PODS_NOTIFIED, CONDITION_READY};
