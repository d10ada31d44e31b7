use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::{format_datetime, round2};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attendance {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// User id of the driver or guide.
    pub staff_id: ObjectId,
    pub date: String,
    pub check_in: DateTime,
    #[serde(default)]
    pub check_out: Option<DateTime>,
    #[serde(default)]
    pub hours_worked: f64,
}

/// Hours between check-in and check-out, rounded to 2 decimals and never negative.
pub fn hours_between(check_in: ChronoDateTime<Utc>, check_out: ChronoDateTime<Utc>) -> f64 {
    let seconds = (check_out - check_in).num_seconds().max(0);
    round2(seconds as f64 / 3600.0)
}

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub staff_id: Option<String>,
    pub month: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct AttendanceResponse {
    pub id: String,
    pub staff_id: String,
    pub date: String,
    pub check_in: String,
    pub check_out: Option<String>,
    pub hours_worked: f64,
}

impl From<Attendance> for AttendanceResponse {
    fn from(a: Attendance) -> Self {
        Self {
            id: a.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            staff_id: a.staff_id.to_hex(),
            date: a.date,
            check_in: format_datetime(&a.check_in),
            check_out: a.check_out.as_ref().map(format_datetime),
            hours_worked: a.hours_worked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn hours_are_rounded() {
        let start = Utc::now();
        assert_eq!(hours_between(start, start + Duration::minutes(500)), 8.33);
    }

    #[test]
    fn clock_skew_never_goes_negative() {
        let start = Utc::now();
        assert_eq!(hours_between(start, start - Duration::minutes(5)), 0.0);
    }
}
