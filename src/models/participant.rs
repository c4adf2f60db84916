//! Participant model.

use serde::{Deserialize, Serialize};

/// A swimmer who can be registered to products.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub id_number: String,
    pub phone: String,
    /// Cached flag, kept in sync by health declaration transitions.
    pub health_approval: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Participant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Request body for creating a participant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParticipantRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub id_number: String,
    #[serde(default)]
    pub phone: String,
}

/// Request body for updating a participant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParticipantRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub health_approval: Option<bool>,
}
