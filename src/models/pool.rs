//! Pool model.

use serde::{Deserialize, Serialize};

/// A pool where products take place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating or renaming a pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRequest {
    pub name: String,
}
