//! Monthly payroll records and the pay calculation.
//!
//! A day counts as full with at least [`FULL_DAY_HOURS`] on the clock and as
//! half with at least [`HALF_DAY_HOURS`]. Shorter or still-open attendance
//! records are unpaid.

use mongodb::bson::{oid::ObjectId, Bson, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{format_datetime, round2, Attendance};
use crate::error::{AppError, AppResult};

pub const FULL_DAY_HOURS: f64 = 8.0;
pub const HALF_DAY_HOURS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayrollStatus {
    Draft,
    Paid,
}

impl PayrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Draft => "Draft",
            PayrollStatus::Paid => "Paid",
        }
    }
}

impl From<PayrollStatus> for Bson {
    fn from(status: PayrollStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayFigures {
    pub full_days: i32,
    pub half_days: i32,
    pub hours_worked: f64,
    pub trips_completed: i32,
    pub daily_rate: f64,
    pub trip_bonus: f64,
    pub base_pay: f64,
    pub bonus_pay: f64,
    pub gross_pay: f64,
    pub deductions: f64,
    pub net_pay: f64,
}

impl PayFigures {
    pub fn compute(
        attendance: &[Attendance],
        trips_completed: i32,
        daily_rate: f64,
        trip_bonus: f64,
        deductions: f64,
    ) -> Self {
        let mut full_days = 0;
        let mut half_days = 0;
        let mut hours_worked = 0.0;

        for record in attendance.iter().filter(|a| a.check_out.is_some()) {
            hours_worked += record.hours_worked;
            if record.hours_worked >= FULL_DAY_HOURS {
                full_days += 1;
            } else if record.hours_worked >= HALF_DAY_HOURS {
                half_days += 1;
            }
        }

        let days = f64::from(full_days) + 0.5 * f64::from(half_days);
        let base_pay = round2(daily_rate * days);
        let bonus_pay = round2(trip_bonus * f64::from(trips_completed));
        let gross_pay = round2(base_pay + bonus_pay);
        let net_pay = round2((gross_pay - deductions).max(0.0));

        Self {
            full_days,
            half_days,
            hours_worked: round2(hours_worked),
            trips_completed,
            daily_rate,
            trip_bonus,
            base_pay,
            bonus_pay,
            gross_pay,
            deductions: round2(deductions),
            net_pay,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payroll {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub staff_id: ObjectId,
    pub month: String,
    #[serde(flatten)]
    pub figures: PayFigures,
    pub status: PayrollStatus,
    pub generated_at: DateTime,
    #[serde(default)]
    pub paid_at: Option<DateTime>,
}

impl Payroll {
    /// A paid record is final; only a missing or draft record may be (re)generated.
    pub fn ensure_regenerable(existing: Option<&Payroll>) -> AppResult<()> {
        match existing {
            Some(p) if p.status == PayrollStatus::Paid => Err(AppError::conflict(format!(
                "Payroll for {} is already paid",
                p.month
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct GeneratePayrollRequest {
    pub staff_id: String,
    pub month: String,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Deductions cannot be negative"))]
    pub deductions: f64,
}

#[derive(Debug, Deserialize)]
pub struct PayrollQuery {
    pub month: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct PayrollResponse {
    pub id: String,
    pub staff_id: String,
    pub month: String,
    #[serde(flatten)]
    pub figures: PayFigures,
    pub status: PayrollStatus,
    pub generated_at: String,
    pub paid_at: Option<String>,
}

impl From<Payroll> for PayrollResponse {
    fn from(p: Payroll) -> Self {
        Self {
            id: p.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            staff_id: p.staff_id.to_hex(),
            month: p.month,
            figures: p.figures,
            status: p.status,
            generated_at: format_datetime(&p.generated_at),
            paid_at: p.paid_at.as_ref().map(format_datetime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, hours: f64, closed: bool) -> Attendance {
        Attendance {
            id: None,
            staff_id: ObjectId::new(),
            date: date.into(),
            check_in: DateTime::now(),
            check_out: closed.then(DateTime::now),
            hours_worked: hours,
        }
    }

    #[test]
    fn full_and_half_days_are_counted() {
        let records = vec![
            day("2026-10-01", 9.0, true),
            day("2026-10-02", 8.0, true),
            day("2026-10-03", 5.5, true),
            day("2026-10-04", 2.0, true),
            day("2026-10-05", 0.0, false),
        ];
        let pay = PayFigures::compute(&records, 3, 40.0, 15.0, 10.0);
        assert_eq!(pay.full_days, 2);
        assert_eq!(pay.half_days, 1);
        assert_eq!(pay.hours_worked, 24.5);
        assert_eq!(pay.base_pay, 100.0);
        assert_eq!(pay.bonus_pay, 45.0);
        assert_eq!(pay.gross_pay, 145.0);
        assert_eq!(pay.net_pay, 135.0);
    }

    #[test]
    fn net_pay_never_goes_negative() {
        let pay = PayFigures::compute(&[day("2026-10-01", 8.0, true)], 0, 30.0, 0.0, 100.0);
        assert_eq!(pay.gross_pay, 30.0);
        assert_eq!(pay.net_pay, 0.0);
    }

    fn record(status: PayrollStatus) -> Payroll {
        Payroll {
            id: Some(ObjectId::new()),
            staff_id: ObjectId::new(),
            month: "2026-01".into(),
            figures: PayFigures::compute(&[], 0, 40.0, 10.0, 0.0),
            status,
            generated_at: DateTime::now(),
            paid_at: None,
        }
    }

    #[test]
    fn paid_payroll_cannot_be_regenerated() {
        let paid = record(PayrollStatus::Paid);
        assert!(matches!(
            Payroll::ensure_regenerable(Some(&paid)),
            Err(AppError::Conflict { .. })
        ));
        assert!(Payroll::ensure_regenerable(Some(&record(PayrollStatus::Draft))).is_ok());
        assert!(Payroll::ensure_regenerable(None).is_ok());
    }

    #[test]
    fn negative_deductions_fail_validation() {
        let request = GeneratePayrollRequest {
            staff_id: ObjectId::new().to_hex(),
            month: "2026-09".into(),
            deductions: -5.0,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn open_records_are_unpaid() {
        let pay = PayFigures::compute(&[day("2026-10-01", 10.0, false)], 0, 50.0, 0.0, 0.0);
        assert_eq!(pay.full_days, 0);
        assert_eq!(pay.gross_pay, 0.0);
    }
}
