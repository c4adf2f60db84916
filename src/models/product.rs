//! Product model: courses, camps and clubs offered in a season.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Kind of product offered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Camp,
    Club,
    Course,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Camp => "camp",
            ProductType::Club => "club",
            ProductType::Course => "course",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "camp" => Some(ProductType::Camp),
            "club" => Some(ProductType::Club),
            "course" => Some(ProductType::Course),
            _ => None,
        }
    }
}

/// Weekday a recurring product meets on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    #[serde(alias = "Sunday")]
    Sunday,
    #[serde(alias = "Monday")]
    Monday,
    #[serde(alias = "Tuesday")]
    Tuesday,
    #[serde(alias = "Wednesday")]
    Wednesday,
    #[serde(alias = "Thursday")]
    Thursday,
    #[serde(alias = "Friday")]
    Friday,
    #[serde(alias = "Saturday")]
    Saturday,
}

impl DayOfWeek {
    /// 0 = Sunday .. 6 = Saturday.
    pub fn index(&self) -> u32 {
        match self {
            DayOfWeek::Sunday => 0,
            DayOfWeek::Monday => 1,
            DayOfWeek::Tuesday => 2,
            DayOfWeek::Wednesday => 3,
            DayOfWeek::Thursday => 4,
            DayOfWeek::Friday => 5,
            DayOfWeek::Saturday => 6,
        }
    }

    pub fn matches(&self, weekday: Weekday) -> bool {
        self.index() == weekday.num_days_from_sunday()
    }
}

/// A course, camp or club belonging to a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub season_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub price: f64,
    pub max_participants: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meetings_count: Option<u32>,
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub season_id: String,
    #[serde(default)]
    pub pool_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Derived from the schedule when omitted.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub max_participants: i64,
    #[serde(default)]
    pub meetings_count: Option<u32>,
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for updating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub season_id: Option<String>,
    /// Absent keeps the pool; `null` clears it.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub pool_id: Option<Option<String>>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub max_participants: Option<i64>,
    #[serde(default)]
    pub meetings_count: Option<u32>,
    #[serde(default)]
    pub days_of_week: Option<Vec<DayOfWeek>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub start_time: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub notes: Option<Option<String>>,
}

/// Query filters for listing products.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(default)]
    pub season_id: Option<String>,
    #[serde(default)]
    pub pool_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_accepts_capitalized_names() {
        let days: Vec<DayOfWeek> = serde_json::from_str(r#"["Sunday", "wednesday"]"#).unwrap();
        assert_eq!(days, vec![DayOfWeek::Sunday, DayOfWeek::Wednesday]);
        assert_eq!(serde_json::to_string(&days).unwrap(), r#"["sunday","wednesday"]"#);
    }

    #[test]
    fn test_day_of_week_matches_chrono_weekday() {
        assert!(DayOfWeek::Sunday.matches(Weekday::Sun));
        assert!(DayOfWeek::Saturday.matches(Weekday::Sat));
        assert!(!DayOfWeek::Monday.matches(Weekday::Tue));
    }

    #[test]
    fn test_product_type_round_trips_through_column_text() {
        for ty in [ProductType::Camp, ProductType::Club, ProductType::Course] {
            assert_eq!(ProductType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ProductType::parse("workshop"), None);
    }
}
