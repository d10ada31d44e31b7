use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{format_datetime, round2};
use crate::error::{AppError, AppResult};

/// Children pay this share of the per-person rate.
pub const CHILD_PRICE_RATIO: f64 = 0.5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Validate)]
pub struct PriceTier {
    #[validate(range(min = 1, message = "Tier minimum must be at least 1"))]
    pub min_people: i32,
    #[validate(range(min = 1, message = "Tier maximum must be at least 1"))]
    pub max_people: i32,
    #[validate(range(exclusive_min = 0.0, message = "Tier price must be positive"))]
    pub price_per_person: f64,
}

impl PriceTier {
    fn contains(&self, headcount: i32) -> bool {
        self.min_people <= headcount && headcount <= self.max_people
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Package {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub duration_days: i32,
    pub base_price: f64,
    #[serde(default)]
    pub price_tiers: Vec<PriceTier>,
    #[serde(default)]
    pub guide_fee_per_day: f64,
    pub max_group_size: i32,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PriceQuote {
    pub adults: i32,
    pub children: i32,
    pub price_per_person: f64,
    pub child_price: f64,
    pub adults_total: f64,
    pub children_total: f64,
    pub guide_fee: f64,
    pub total_price: f64,
}

impl Package {
    /// Per-person rate for a group of `headcount`: the matching tier, else the base price.
    pub fn rate_for(&self, headcount: i32) -> f64 {
        self.price_tiers
            .iter()
            .find(|t| t.contains(headcount))
            .map(|t| t.price_per_person)
            .unwrap_or(self.base_price)
    }

    pub fn quote(&self, adults: i32, children: i32, needs_guide: bool) -> AppResult<PriceQuote> {
        if adults < 1 {
            return Err(AppError::validation("At least one adult is required"));
        }
        if children < 0 {
            return Err(AppError::validation("Children cannot be negative"));
        }
        let headcount = adults
            .checked_add(children)
            .ok_or_else(|| AppError::validation("Group size is out of range"))?;
        if headcount > self.max_group_size {
            return Err(AppError::validation(format!(
                "Group of {} exceeds the maximum of {} for this package",
                headcount, self.max_group_size
            )));
        }

        let rate = self.rate_for(headcount);
        let child_price = round2(rate * CHILD_PRICE_RATIO);
        let adults_total = round2(rate * f64::from(adults));
        let children_total = round2(child_price * f64::from(children));
        let guide_fee = if needs_guide {
            round2(self.guide_fee_per_day * f64::from(self.duration_days))
        } else {
            0.0
        };

        Ok(PriceQuote {
            adults,
            children,
            price_per_person: round2(rate),
            child_price,
            adults_total,
            children_total,
            guide_fee,
            total_price: round2(adults_total + children_total + guide_fee),
        })
    }
}

/// Tiers must have positive bounds and prices and must not overlap.
pub fn validate_tiers(tiers: &[PriceTier]) -> AppResult<()> {
    for tier in tiers {
        crate::error::validate_request(tier)?;
        if tier.min_people > tier.max_people {
            return Err(AppError::validation(format!(
                "Tier {}-{} has its bounds reversed",
                tier.min_people, tier.max_people
            )));
        }
    }
    let mut sorted: Vec<&PriceTier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.min_people);
    for pair in sorted.windows(2) {
        if pair[1].min_people <= pair[0].max_people {
            return Err(AppError::validation(format!(
                "Tiers {}-{} and {}-{} overlap",
                pair[0].min_people, pair[0].max_people, pair[1].min_people, pair[1].max_people
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePackageRequest {
    #[validate(length(min = 3, max = 120, message = "Title must be 3-120 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 2, message = "Location is required"))]
    pub location: String,
    #[validate(range(min = 1, max = 60, message = "Duration must be 1-60 days"))]
    pub duration_days: i32,
    #[validate(range(exclusive_min = 0.0, message = "Base price must be positive"))]
    pub base_price: f64,
    #[serde(default)]
    pub price_tiers: Vec<PriceTier>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Guide fee cannot be negative"))]
    pub guide_fee_per_day: f64,
    #[validate(range(min = 1, max = 100, message = "Group size must be 1-100"))]
    pub max_group_size: i32,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdatePackageRequest {
    #[validate(length(min = 3, max = 120, message = "Title must be 3-120 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 1, max = 60, message = "Duration must be 1-60 days"))]
    pub duration_days: Option<i32>,
    #[validate(range(exclusive_min = 0.0, message = "Base price must be positive"))]
    pub base_price: Option<f64>,
    pub price_tiers: Option<Vec<PriceTier>>,
    #[validate(range(min = 0.0, message = "Guide fee cannot be negative"))]
    pub guide_fee_per_day: Option<f64>,
    #[validate(range(min = 1, max = 100, message = "Group size must be 1-100"))]
    pub max_group_size: Option<i32>,
    pub highlights: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PackageQuery {
    pub location: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteQuery {
    #[validate(range(min = 1, max = 100, message = "At least one adult is required"))]
    pub adults: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "Children cannot be negative"))]
    pub children: i32,
    #[serde(default)]
    pub needs_guide: bool,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct PackageResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub duration_days: i32,
    pub base_price: f64,
    pub price_tiers: Vec<PriceTier>,
    pub guide_fee_per_day: f64,
    pub max_group_size: i32,
    pub highlights: Vec<String>,
    pub images: Vec<String>,
    pub active: bool,
    pub created_at: String,
}

impl From<Package> for PackageResponse {
    fn from(package: Package) -> Self {
        Self {
            id: package.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            title: package.title,
            description: package.description,
            location: package.location,
            duration_days: package.duration_days,
            base_price: package.base_price,
            price_tiers: package.price_tiers,
            guide_fee_per_day: package.guide_fee_per_day,
            max_group_size: package.max_group_size,
            highlights: package.highlights,
            images: package.images,
            active: package.active,
            created_at: format_datetime(&package.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Package {
        Package {
            id: None,
            title: "Yala Leopard Trail".into(),
            description: "Two days in Yala".into(),
            location: "Yala".into(),
            duration_days: 2,
            base_price: 200.0,
            price_tiers: vec![
                PriceTier { min_people: 1, max_people: 2, price_per_person: 180.0 },
                PriceTier { min_people: 3, max_people: 5, price_per_person: 150.0 },
            ],
            guide_fee_per_day: 40.0,
            max_group_size: 8,
            highlights: vec![],
            images: vec![],
            active: true,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn tier_matching_headcount_sets_rate() {
        let quote = package().quote(2, 2, false).unwrap();
        assert_eq!(quote.price_per_person, 150.0);
        assert_eq!(quote.child_price, 75.0);
        assert_eq!(quote.total_price, 450.0);
        assert_eq!(quote.guide_fee, 0.0);
    }

    #[test]
    fn base_price_applies_outside_tiers() {
        let quote = package().quote(6, 0, false).unwrap();
        assert_eq!(quote.price_per_person, 200.0);
        assert_eq!(quote.total_price, 1200.0);
    }

    #[test]
    fn guide_fee_scales_with_duration() {
        let quote = package().quote(1, 0, true).unwrap();
        assert_eq!(quote.guide_fee, 80.0);
        assert_eq!(quote.total_price, 260.0);
    }

    #[test]
    fn group_limits_are_enforced() {
        assert!(package().quote(0, 2, false).is_err());
        assert!(package().quote(5, 4, false).is_err());
        assert!(package().quote(2, -1, false).is_err());
    }

    #[test]
    fn huge_headcounts_are_rejected_without_overflow() {
        let result = package().quote(i32::MAX, 1, false);
        assert!(matches!(result, Err(AppError::Validation { .. })));
        assert!(package().quote(i32::MAX, i32::MAX, true).is_err());
    }

    #[test]
    fn quote_query_is_bounded() {
        let query = |adults, children| QuoteQuery { adults, children, needs_guide: false };
        assert!(query(2, 1).validate().is_ok());
        assert!(query(0, 1).validate().is_err());
        assert!(query(i32::MAX, 1).validate().is_err());
        assert!(query(2, -1).validate().is_err());
    }

    #[test]
    fn overlapping_tiers_are_rejected() {
        let tiers = vec![
            PriceTier { min_people: 1, max_people: 4, price_per_person: 100.0 },
            PriceTier { min_people: 4, max_people: 6, price_per_person: 90.0 },
        ];
        assert!(validate_tiers(&tiers).is_err());

        let reversed = vec![PriceTier { min_people: 5, max_people: 2, price_per_person: 100.0 }];
        assert!(validate_tiers(&reversed).is_err());

        assert!(validate_tiers(&package().price_tiers).is_ok());
    }
}
