use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use crate::domain::clock::ClockTime;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    HalfDay,
    OnLeave,
}

impl AttendanceStatus {
    /// Value stored in the `attendance.status` column.
    pub fn db_value(self) -> &'static str {
        self.into()
    }

    /// Statuses that follow from the check-in time rather than being set by hand.
    pub fn is_derived(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "employeeId": 1000,
    "date": "2024-03-01",
    "status": "late",
    "checkIn": "09:45",
    "checkOut": "18:15"
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>, example = "09:45")]
    pub check_in: Option<ClockTime>,
    #[schema(value_type = Option<String>, example = "18:15")]
    pub check_out: Option<ClockTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub status: String,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = strum::ParseError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            status: row.status.parse()?,
            check_in: row.check_in.map(ClockTime::from),
            check_out: row.check_out.map(ClockTime::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_and_wire_names_differ_by_case() {
        assert_eq!(AttendanceStatus::OnLeave.db_value(), "on_leave");
        assert_eq!("half_day".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::HalfDay);
        assert_eq!(serde_json::to_string(&AttendanceStatus::OnLeave).unwrap(), "\"onLeave\"");
    }

    #[test]
    fn row_converts_into_record() {
        let row = AttendanceRow {
            id: 7,
            employee_id: 3,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: "late".into(),
            check_in: NaiveTime::from_hms_opt(9, 45, 12),
            check_out: None,
        };
        let record = AttendanceRecord::try_from(row).unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.check_in.unwrap().to_string(), "09:45");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["employeeId"], 3);
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["checkOut"], serde_json::Value::Null);
    }

    #[test]
    fn unknown_stored_status_fails() {
        let row = AttendanceRow {
            id: 1,
            employee_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: "sleeping".into(),
            check_in: None,
            check_out: None,
        };
        assert!(AttendanceRecord::try_from(row).is_err());
    }
}
