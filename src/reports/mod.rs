//! Registration exports and the financial summary.
//!
//! The CSV goes to spreadsheet users, so it carries a UTF-8 byte order mark
//! and Hebrew column titles.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::balance::{from_agorot, to_agorot, PaymentStatus};
use crate::errors::AppError;
use crate::models::{Discount, Participant, Product, Registration};

/// Byte order mark so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADER: [&str; 13] = [
    "שם פרטי",
    "שם משפחה",
    "תעודת זהות",
    "טלפון",
    "מוצר",
    "תאריך רישום",
    "סכום לתשלום",
    "הנחה",
    "שולם",
    "יתרה",
    "סטטוס תשלום",
    "מספר קבלה",
    "הצהרת בריאות",
];

/// Registrations joined with the participants and products they reference.
pub struct ReportData<'a> {
    pub registrations: &'a [Registration],
    pub participants: HashMap<&'a str, &'a Participant>,
    pub products: HashMap<&'a str, &'a Product>,
}

impl<'a> ReportData<'a> {
    pub fn new(
        registrations: &'a [Registration],
        participants: &'a [Participant],
        products: &'a [Product],
    ) -> Self {
        Self {
            registrations,
            participants: participants.iter().map(|p| (p.id.as_str(), p)).collect(),
            products: products.iter().map(|p| (p.id.as_str(), p)).collect(),
        }
    }
}

/// Render registrations as CSV, BOM first.
///
/// Rows whose participant or product is missing are still written, with
/// empty cells.
pub fn registrations_csv(data: &ReportData<'_>) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(CSV_HEADER)?;

    for registration in data.registrations {
        let participant = data.participants.get(registration.participant_id.as_str());
        let product = data.products.get(registration.product_id.as_str());
        let registration_date = registration.registration_date.format("%d/%m/%Y").to_string();
        let required = format_amount(registration.required_amount);
        let discount = discount_cell(&registration.discount);
        let paid = format_amount(registration.paid_amount);
        let remaining = format_amount(registration.balance.remaining);

        writer.write_record([
            participant.map(|p| p.first_name.as_str()).unwrap_or_default(),
            participant.map(|p| p.last_name.as_str()).unwrap_or_default(),
            participant.map(|p| p.id_number.as_str()).unwrap_or_default(),
            participant.map(|p| p.phone.as_str()).unwrap_or_default(),
            product.map(|p| p.name.as_str()).unwrap_or_default(),
            registration_date.as_str(),
            required.as_str(),
            discount.as_str(),
            paid.as_str(),
            remaining.as_str(),
            registration.balance.status.hebrew_label(),
            registration.receipt_number.as_deref().unwrap_or_default(),
            match participant {
                Some(p) if p.health_approval => "כן",
                _ => "לא",
            },
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("Failed to finish CSV: {}", e)))
}

fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

fn discount_cell(discount: &Discount) -> String {
    match discount {
        Discount::None => String::new(),
        Discount::Approved { amount } => format_amount(*amount),
        Discount::Pending { amount } => format!("{} (ממתינה לאישור)", format_amount(*amount)),
    }
}

/// Totals over a set of registrations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
    pub registrations: usize,
    pub total_required: f64,
    pub total_effective_required: f64,
    pub total_paid: f64,
    pub total_outstanding: f64,
    /// Keyed by status name; every status is present.
    pub status_counts: BTreeMap<&'static str, usize>,
    pub products: Vec<ProductOccupancy>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOccupancy {
    pub product_id: String,
    pub name: String,
    pub registered: usize,
    pub max_participants: i64,
}

/// Summarize registrations. `products` lists every product in scope,
/// including those nobody registered to yet.
pub fn summarize(
    season_id: Option<String>,
    registrations: &[Registration],
    products: &[Product],
) -> SummaryReport {
    let mut status_counts: BTreeMap<&'static str, usize> =
        PaymentStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut per_product: HashMap<&str, usize> = HashMap::new();

    // Summed in agorot, like the balance computation.
    let mut required = 0_i64;
    let mut effective = 0_i64;
    let mut paid = 0_i64;
    let mut outstanding = 0_i64;

    for registration in registrations {
        required += to_agorot(registration.required_amount);
        effective += to_agorot(registration.balance.effective_required);
        paid += to_agorot(registration.balance.paid);
        outstanding += to_agorot(registration.balance.remaining);
        *status_counts
            .entry(registration.balance.status.as_str())
            .or_default() += 1;
        *per_product
            .entry(registration.product_id.as_str())
            .or_default() += 1;
    }

    let products = products
        .iter()
        .map(|p| ProductOccupancy {
            product_id: p.id.clone(),
            name: p.name.clone(),
            registered: per_product.get(p.id.as_str()).copied().unwrap_or(0),
            max_participants: p.max_participants,
        })
        .collect();

    SummaryReport {
        season_id,
        registrations: registrations.len(),
        total_required: from_agorot(required),
        total_effective_required: from_agorot(effective),
        total_paid: from_agorot(paid),
        total_outstanding: from_agorot(outstanding),
        status_counts,
        products,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{Balance, PaidAmount};
    use crate::models::ProductType;
    use chrono::NaiveDate;

    fn participant(id: &str, health_approval: bool) -> Participant {
        Participant {
            id: id.to_string(),
            first_name: "נועה".to_string(),
            last_name: "לוי".to_string(),
            id_number: "123456782".to_string(),
            phone: "050-1234567".to_string(),
            health_approval,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn product(id: &str, max_participants: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Course {}", id),
            product_type: ProductType::Course,
            season_id: "s1".to_string(),
            pool_id: None,
            start_date: None,
            end_date: None,
            price: 100.0,
            max_participants,
            meetings_count: None,
            days_of_week: Vec::new(),
            start_time: None,
            notes: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn registration(id: &str, product_id: &str, discount: Discount, paid: f64) -> Registration {
        Registration {
            id: id.to_string(),
            product_id: product_id.to_string(),
            participant_id: "p1".to_string(),
            registration_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            required_amount: 100.0,
            discount,
            receipt_number: Some("R-7".to_string()),
            paid_amount: paid,
            balance: Balance::compute(100.0, &discount, PaidAmount::Explicit(paid)),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_csv_starts_with_bom_and_hebrew_header() {
        let participants = [participant("p1", true)];
        let products = [product("c1", 10)];
        let registrations = [registration("r1", "c1", Discount::None, 40.0)];
        let data = ReportData::new(&registrations, &participants, &products);

        let bytes = registrations_csv(&data).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.contains("05/01/2025"));
        assert!(row.contains("100.00,,40.00,60.00,חלקי,R-7,כן"));
    }

    #[test]
    fn test_csv_keeps_rows_with_missing_references() {
        let registrations = [registration("r1", "gone", Discount::None, 0.0)];
        let data = ReportData::new(&registrations, &[], &[]);

        let bytes = registrations_csv(&data).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with(",,,,,"));
    }

    #[test]
    fn test_summary_totals_and_occupancy() {
        let products = [product("c1", 2), product("c2", 8)];
        let registrations = [
            registration("r1", "c1", Discount::None, 100.0),
            registration("r2", "c1", Discount::Approved { amount: 30.0 }, 50.0),
            registration("r3", "c1", Discount::Pending { amount: 30.0 }, 0.1 + 0.2),
        ];

        let report = summarize(Some("s1".to_string()), &registrations, &products);

        assert_eq!(report.registrations, 3);
        assert_eq!(report.total_required, 300.0);
        assert_eq!(report.total_effective_required, 270.0);
        assert_eq!(report.total_paid, 150.3);
        assert_eq!(report.total_outstanding, 119.7);
        assert_eq!(report.status_counts["Full"], 1);
        assert_eq!(report.status_counts["Partial/Discount"], 1);
        assert_eq!(report.status_counts["Partial"], 1);
        assert_eq!(report.status_counts["Overpaid"], 0);
        assert_eq!(report.products[0].registered, 3);
        assert_eq!(report.products[1].registered, 0);
    }
}
