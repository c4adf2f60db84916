//! Payment model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single recorded transaction against a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub registration_id: String,
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub receipt_number: String,
    pub created_at: String,
}

/// Request body for recording a payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub registration_id: String,
    pub amount: f64,
    /// Defaults to today.
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub receipt_number: String,
}
