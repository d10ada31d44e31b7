use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    dates::{format_date, parse_date},
    format_datetime, Role,
};
use crate::error::{AppError, AppResult};

/// Employment profile for a driver or guide. Keyed by the staff member's user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Staff {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub role: Role,
    pub phone: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub daily_rate: f64,
    #[serde(default)]
    pub trip_bonus: f64,
    pub available: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(length(min = 2, max = 80, message = "Name must be 2-80 characters"))]
    pub name: String,
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    #[validate(length(min = 7, max = 20, message = "Phone number is invalid"))]
    pub phone: String,
    pub license_number: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[validate(range(min = 0.0, message = "Daily rate cannot be negative"))]
    pub daily_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Trip bonus cannot be negative"))]
    pub trip_bonus: f64,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateStaffRequest {
    #[validate(length(min = 7, max = 20, message = "Phone number is invalid"))]
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub languages: Option<Vec<String>>,
    #[validate(range(min = 0.0, message = "Daily rate cannot be negative"))]
    pub daily_rate: Option<f64>,
    #[validate(range(min = 0.0, message = "Trip bonus cannot be negative"))]
    pub trip_bonus: Option<f64>,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StaffQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub role: Role,
    pub start_date: String,
    pub end_date: String,
}

impl AvailabilityQuery {
    /// Checked date range in canonical `YYYY-MM-DD` form, as stored on bookings.
    pub fn window(&self) -> AppResult<(String, String)> {
        if !self.role.is_staff() {
            return Err(AppError::validation("Role must be driver or guide"));
        }
        let start = parse_date(&self.start_date)?;
        let end = parse_date(&self.end_date)?;
        if end < start {
            return Err(AppError::validation("end_date is before start_date"));
        }
        Ok((format_date(start), format_date(end)))
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct StaffResponse {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: String,
    pub license_number: Option<String>,
    pub languages: Vec<String>,
    pub daily_rate: f64,
    pub trip_bonus: f64,
    pub available: bool,
    pub created_at: String,
}

impl StaffResponse {
    pub fn new(staff: Staff, name: String, email: String) -> Self {
        Self {
            id: staff.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            user_id: staff.user_id.to_hex(),
            name,
            email,
            role: staff.role,
            phone: staff.phone,
            license_number: staff.license_number,
            languages: staff.languages,
            daily_rate: staff.daily_rate,
            trip_bonus: staff.trip_bonus,
            available: staff.available,
            created_at: format_datetime(&staff.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(role: Role, start: &str, end: &str) -> AvailabilityQuery {
        AvailabilityQuery {
            role,
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }

    #[test]
    fn availability_window_is_canonical() {
        let (start, end) = query(Role::Guide, " 2026-11-1", "2026-11-03 ").window().unwrap();
        assert_eq!(start, "2026-11-01");
        assert_eq!(end, "2026-11-03");
    }

    #[test]
    fn availability_window_rejects_bad_input() {
        assert!(matches!(
            query(Role::Driver, "2026-11-05", "2026-11-01").window(),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            query(Role::Customer, "2026-11-01", "2026-11-02").window(),
            Err(AppError::Validation { .. })
        ));
        assert!(query(Role::Driver, "2026-11-01", "2026-11-01").window().is_ok());
    }
}
