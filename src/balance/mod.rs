//! Payment status and balance computation for registrations.
//!
//! Amounts are compared in whole agorot so that summing float payments never
//! flips a registration between `Full` and `Partial`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Discount, Payment};

/// Payment status of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Full,
    Partial,
    Overpaid,
    #[serde(rename = "Full/Discount")]
    FullDiscount,
    #[serde(rename = "Partial/Discount")]
    PartialDiscount,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Full,
        PaymentStatus::Partial,
        PaymentStatus::Overpaid,
        PaymentStatus::FullDiscount,
        PaymentStatus::PartialDiscount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Full => "Full",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Overpaid => "Overpaid",
            PaymentStatus::FullDiscount => "Full/Discount",
            PaymentStatus::PartialDiscount => "Partial/Discount",
        }
    }

    /// Label used in spreadsheet exports.
    pub fn hebrew_label(&self) -> &'static str {
        match self {
            PaymentStatus::Full => "מלא",
            PaymentStatus::Partial => "חלקי",
            PaymentStatus::Overpaid => "תשלום יתר",
            PaymentStatus::FullDiscount => "מלא (הנחה)",
            PaymentStatus::PartialDiscount => "חלקי (הנחה)",
        }
    }
}

/// Where the paid total comes from.
#[derive(Debug, Clone, Copy)]
pub enum PaidAmount<'a> {
    /// Sum the registration's payment rows.
    Payments(&'a [Payment]),
    /// A total computed elsewhere, e.g. by an SQL aggregate.
    Explicit(f64),
}

impl PaidAmount<'_> {
    pub fn total(&self) -> f64 {
        match self {
            PaidAmount::Payments(payments) => payments.iter().map(|p| p.amount).sum(),
            PaidAmount::Explicit(amount) => *amount,
        }
    }
}

/// Whole agorot (hundredths of a shekel), rounded.
pub(crate) fn to_agorot(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub(crate) fn from_agorot(agorot: i64) -> f64 {
    agorot as f64 / 100.0
}

/// Amount owed after an approved discount, floored at zero.
pub fn effective_required_amount(required: f64, discount: &Discount) -> f64 {
    let approved = match discount {
        Discount::Approved { amount } => *amount,
        Discount::None | Discount::Pending { .. } => 0.0,
    };
    (required - approved).max(0.0)
}

/// Compute the payment status of a registration.
///
/// An approved discount takes priority: such registrations are only ever
/// `Full/Discount` or `Partial/Discount`, never `Overpaid`.
pub fn calculate_payment_status(
    required: f64,
    discount: &Discount,
    paid: PaidAmount<'_>,
) -> PaymentStatus {
    let paid = to_agorot(paid.total());

    if discount.is_approved() {
        let effective = to_agorot(effective_required_amount(required, discount));
        return if paid >= effective {
            PaymentStatus::FullDiscount
        } else {
            PaymentStatus::PartialDiscount
        };
    }

    match paid.cmp(&to_agorot(required)) {
        Ordering::Greater => PaymentStatus::Overpaid,
        Ordering::Equal => PaymentStatus::Full,
        Ordering::Less => PaymentStatus::Partial,
    }
}

/// Balance summary attached to every registration read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub effective_required: f64,
    pub paid: f64,
    pub remaining: f64,
    pub status: PaymentStatus,
}

impl Balance {
    pub fn compute(required: f64, discount: &Discount, paid: PaidAmount<'_>) -> Self {
        let effective = to_agorot(effective_required_amount(required, discount));
        let paid_agorot = to_agorot(paid.total());

        Self {
            effective_required: from_agorot(effective),
            paid: from_agorot(paid_agorot),
            remaining: from_agorot((effective - paid_agorot).max(0)),
            status: calculate_payment_status(required, discount, paid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn payment(amount: f64) -> Payment {
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            registration_id: "reg-1".to_string(),
            amount,
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            receipt_number: "1001".to_string(),
            created_at: "2025-01-05T00:00:00Z".to_string(),
        }
    }

    fn status(required: f64, discount: Discount, paid: f64) -> PaymentStatus {
        calculate_payment_status(required, &discount, PaidAmount::Explicit(paid))
    }

    #[test]
    fn test_discount_boundary() {
        let discount = Discount::Approved { amount: 20.0 };
        assert_eq!(status(100.0, discount, 80.0), PaymentStatus::FullDiscount);
        assert_eq!(status(100.0, discount, 79.0), PaymentStatus::PartialDiscount);
        // Paying above the discounted price is still reported as a discounted full payment.
        assert_eq!(status(100.0, discount, 150.0), PaymentStatus::FullDiscount);
    }

    #[test]
    fn test_no_discount_boundary() {
        assert_eq!(status(100.0, Discount::None, 100.0), PaymentStatus::Full);
        assert_eq!(status(100.0, Discount::None, 101.0), PaymentStatus::Overpaid);
        assert_eq!(status(100.0, Discount::None, 99.0), PaymentStatus::Partial);
    }

    #[test]
    fn test_pending_discount_is_ignored() {
        let pending = Discount::Pending { amount: 20.0 };
        assert_eq!(status(100.0, pending, 80.0), PaymentStatus::Partial);
        assert_eq!(status(100.0, pending, 100.0), PaymentStatus::Full);
    }

    #[test]
    fn test_discount_larger_than_required_is_clamped() {
        let discount = Discount::Approved { amount: 150.0 };
        assert_eq!(effective_required_amount(100.0, &discount), 0.0);
        assert_eq!(status(100.0, discount, 0.0), PaymentStatus::FullDiscount);
    }

    #[test]
    fn test_payments_are_summed() {
        let payments = vec![payment(33.33), payment(33.33), payment(33.34)];
        assert_eq!(
            calculate_payment_status(100.0, &Discount::None, PaidAmount::Payments(&payments)),
            PaymentStatus::Full
        );
        assert_eq!(
            calculate_payment_status(100.0, &Discount::None, PaidAmount::Payments(&[])),
            PaymentStatus::Partial
        );
    }

    #[test]
    fn test_float_noise_does_not_flip_status() {
        let payments: Vec<Payment> = (0..10).map(|_| payment(0.1)).collect();
        assert_eq!(
            calculate_payment_status(1.0, &Discount::None, PaidAmount::Payments(&payments)),
            PaymentStatus::Full
        );
    }

    #[test]
    fn test_status_is_total_over_non_negative_inputs() {
        let amounts = [0.0, 0.5, 20.0, 79.99, 80.0, 100.0, 100.01, 250.0];
        for required in amounts {
            for discount_amount in amounts {
                for paid in amounts {
                    for discount in [
                        Discount::None,
                        Discount::Pending {
                            amount: discount_amount,
                        },
                        Discount::Approved {
                            amount: discount_amount,
                        },
                    ] {
                        let result = status(required, discount, paid);
                        assert!(PaymentStatus::ALL.contains(&result));
                        if discount.is_approved() {
                            assert!(matches!(
                                result,
                                PaymentStatus::FullDiscount | PaymentStatus::PartialDiscount
                            ));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_balance_summary() {
        let balance = Balance::compute(
            100.0,
            &Discount::Approved { amount: 20.0 },
            PaidAmount::Explicit(50.0),
        );
        assert_eq!(balance.effective_required, 80.0);
        assert_eq!(balance.paid, 50.0);
        assert_eq!(balance.remaining, 30.0);
        assert_eq!(balance.status, PaymentStatus::PartialDiscount);

        let overpaid = Balance::compute(100.0, &Discount::None, PaidAmount::Explicit(120.0));
        assert_eq!(overpaid.remaining, 0.0);
        assert_eq!(overpaid.status, PaymentStatus::Overpaid);
    }

    #[test]
    fn test_status_serializes_with_slash_names() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::FullDiscount).unwrap(),
            "\"Full/Discount\""
        );
        for status in PaymentStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
