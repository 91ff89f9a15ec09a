//! # Decofile Status
//!
//! Status types for tracking reconciliation state and conditions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the ConfigMap is materialized
pub const CONDITION_READY: &str = "Ready";

/// Condition type reporting the outcome of the last notification fan-out.
/// Its message carries a `commit:<sha>` or `timestamp:<unix-seconds>`
/// identifier naming the configuration generation it reports on.
pub const CONDITION_PODS_NOTIFIED: &str = "PodsNotified";

/// Observed state of a Decofile
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecofileStatus {
    /// Name of the ConfigMap owned by this Decofile
    #[serde(default)]
    pub config_map_name: Option<String>,
    /// Last time the reconciler updated this resource (RFC3339)
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Which source variant produced the current ConfigMap
    #[serde(default)]
    pub source_type: Option<String>,
    /// Revision identifier of the last successful archive fetch.
    /// Matching revisions skip the download on subsequent reconciles.
    #[serde(default)]
    pub last_seen_revision: Option<String>,
    /// Latest available observations of the Decofile's state
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl DecofileStatus {
    /// Replace the condition with the same type, or append it.
    pub fn upsert_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|existing| existing.r#type == condition.r#type)
        {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    /// Look up a condition by type.
    #[must_use]
    pub fn condition(&self, r#type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == r#type)
    }
}

/// Condition represents a status condition of the resource
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Build a condition stamped with the current transition time.
    pub fn new(
        r#type: impl Into<String>,
        status: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: r#type.into(),
            status: status.into(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}
