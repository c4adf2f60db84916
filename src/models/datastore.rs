//! Revision metadata used by dashboards to detect changes.

use serde::{Deserialize, Serialize};

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub schema_version: i32,
    pub revision_id: i64,
    pub generated_at: String,
}
