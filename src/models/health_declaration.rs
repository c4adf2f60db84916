//! Health declaration model and the public signing form payloads.

use serde::{Deserialize, Serialize};

/// Lifecycle of a health declaration form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Pending,
    Signed,
    Approved,
    Declined,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Pending => "pending",
            FormStatus::Signed => "signed",
            FormStatus::Approved => "approved",
            FormStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FormStatus::Pending),
            "signed" => Some(FormStatus::Signed),
            "approved" => Some(FormStatus::Approved),
            "declined" => Some(FormStatus::Declined),
            _ => None,
        }
    }

    /// Value the participant's `healthApproval` flag takes after entering this status.
    pub fn health_approval(&self) -> Option<bool> {
        match self {
            FormStatus::Pending => None,
            FormStatus::Signed | FormStatus::Approved => Some(true),
            FormStatus::Declined => Some(false),
        }
    }
}

/// A medical-fitness attestation, signed by a guardian or recorded by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDeclaration {
    pub id: String,
    /// Historical rows may hold a registration id here instead of a participant id.
    pub participant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
    pub token: String,
    pub form_status: FormStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for generating a signing link for a registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeclarationRequest {
    pub registration_id: String,
}

/// Request body for an operator status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeclarationStatusRequest {
    pub form_status: FormStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Submission posted by a guardian on the public signing page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationSubmission {
    #[serde(default)]
    pub agreement: bool,
    #[serde(default)]
    pub medical_notes: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub parent_id_number: String,
}

/// What the public signing page shows before submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDeclarationForm {
    pub token: String,
    pub form_status: FormStatus,
    pub participant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}
