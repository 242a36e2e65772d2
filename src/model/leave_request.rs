use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
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
pub enum LeaveType {
    Casual,
    Sick,
    Earned,
    Unpaid,
    Maternity,
    Paternity,
    WorkFromHome,
}

impl LeaveType {
    pub fn db_value(self) -> &'static str {
        self.into()
    }

    /// Unpaid leave is never debited against an allowance.
    pub fn has_quota(self) -> bool {
        self != LeaveType::Unpaid
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveDuration {
    #[default]
    FullDay,
    HalfDay,
    FirstHalf,
    SecondHalf,
}

impl LeaveDuration {
    pub fn db_value(self) -> &'static str {
        self.into()
    }

    /// Days debited per calendar day of leave.
    pub fn weight(self) -> f64 {
        match self {
            LeaveDuration::FullDay => 1.0,
            LeaveDuration::HalfDay | LeaveDuration::FirstHalf | LeaveDuration::SecondHalf => 0.5,
        }
    }

    pub fn is_partial(self) -> bool {
        self != LeaveDuration::FullDay
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn db_value(self) -> &'static str {
        self.into()
    }

    pub fn is_terminal(self) -> bool {
        self != LeaveStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "employeeId": 1000,
    "startDate": "2026-01-05",
    "endDate": "2026-01-06",
    "leaveType": "casual",
    "leaveDuration": "fullDay",
    "reason": "Family function",
    "status": "pending",
    "adminComment": null,
    "createdAt": "2026-01-01T09:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    pub leave_duration: LeaveDuration,
    pub reason: String,
    pub status: LeaveStatus,
    pub admin_comment: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub leave_duration: String,
    pub reason: String,
    pub status: String,
    pub admin_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = strum::ParseError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            start_date: row.start_date,
            end_date: row.end_date,
            leave_type: row.leave_type.parse()?,
            leave_duration: row.leave_duration.parse()?,
            reason: row.reason,
            status: row.status.parse()?,
            admin_comment: row.admin_comment,
            created_at: row.created_at,
        })
    }
}
