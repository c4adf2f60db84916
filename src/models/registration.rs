//! Registration model linking a participant to a product.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::balance::Balance;

/// Discount state of a registration.
///
/// Only an approved discount reduces the amount owed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Discount {
    #[default]
    None,
    Pending { amount: f64 },
    Approved { amount: f64 },
}

impl Discount {
    /// Build from the `discount_amount` / `discount_approved` column pair.
    pub fn from_columns(amount: Option<f64>, approved: bool) -> Self {
        match amount {
            Some(amount) if approved => Discount::Approved { amount },
            Some(amount) if amount > 0.0 => Discount::Pending { amount },
            _ => Discount::None,
        }
    }

    /// Split into the `discount_amount` / `discount_approved` column pair.
    pub fn to_columns(self) -> (Option<f64>, bool) {
        match self {
            Discount::None => (None, false),
            Discount::Pending { amount } => (Some(amount), false),
            Discount::Approved { amount } => (Some(amount), true),
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Discount::None => 0.0,
            Discount::Pending { amount } | Discount::Approved { amount } => *amount,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Discount::Approved { .. })
    }
}

/// A participant's enrolment in a product with its financial terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub product_id: String,
    pub participant_id: String,
    pub registration_date: NaiveDate,
    pub required_amount: f64,
    pub discount: Discount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    /// Sum of the registration's payments, computed on read.
    pub paid_amount: f64,
    pub balance: Balance,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationRequest {
    pub product_id: String,
    pub participant_id: String,
    /// Defaults to today.
    #[serde(default)]
    pub registration_date: Option<NaiveDate>,
    /// Defaults to the product price.
    #[serde(default)]
    pub required_amount: Option<f64>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub receipt_number: Option<String>,
}

/// Request body for updating a registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRegistrationRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub registration_date: Option<NaiveDate>,
    #[serde(default)]
    pub required_amount: Option<f64>,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub receipt_number: Option<String>,
}

/// Request body for applying a discount.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDiscountRequest {
    pub amount: f64,
}

/// Query filters for listing registrations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFilter {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub season_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_columns() {
        assert_eq!(Discount::from_columns(None, false), Discount::None);
        assert_eq!(Discount::from_columns(None, true), Discount::None);
        assert_eq!(Discount::from_columns(Some(0.0), false), Discount::None);
        assert_eq!(
            Discount::from_columns(Some(20.0), false),
            Discount::Pending { amount: 20.0 }
        );
        assert_eq!(
            Discount::from_columns(Some(20.0), true),
            Discount::Approved { amount: 20.0 }
        );
        assert_eq!(
            Discount::Approved { amount: 5.0 }.to_columns(),
            (Some(5.0), true)
        );
    }

    #[test]
    fn test_discount_json_shape() {
        let json = serde_json::to_value(Discount::Approved { amount: 20.0 }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "approved", "amount": 20.0 }));

        let none: Discount = serde_json::from_str(r#"{"status":"none"}"#).unwrap();
        assert_eq!(none, Discount::None);
    }
}
