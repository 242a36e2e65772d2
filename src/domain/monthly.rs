use chrono::Datelike;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::clock::{WorkedTime, elapsed};
use crate::domain::period::Period;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub employee_id: u64,
    pub year: i32,
    pub month: u32,
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    pub half_days: u32,
    pub total_days: u32,
    pub total_minutes: u32,
    /// Fractional hours, 4:30 worked is 4.5.
    pub total_hours: f64,
    #[schema(example = "164:30")]
    pub total_hours_display: String,
    pub attendance_percentage: f64,
}

/// Attendance counts for one day, across one or all employees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub on_leave: u32,
    pub half_day: u32,
    pub total: u32,
}

/// `(attended / total) * 100` to one decimal, zero when nothing was recorded.
pub fn attendance_percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = attended.min(total) as f64 * 100.0 / total as f64;
    (pct * 10.0).round() / 10.0
}

/// Aggregates one employee-month. Records for other employees or
/// outside the month are skipped.
pub fn summarize_month(
    employee_id: u64,
    month: Period,
    records: &[AttendanceRecord],
) -> MonthlySummary {
    let mut summary = MonthlySummary {
        employee_id,
        year: month.start().year(),
        month: month.start().month(),
        present_days: 0,
        late_days: 0,
        absent_days: 0,
        leave_days: 0,
        half_days: 0,
        total_days: 0,
        total_minutes: 0,
        total_hours: 0.0,
        total_hours_display: String::new(),
        attendance_percentage: 0.0,
    };

    let mut worked = WorkedTime::default();
    for record in records
        .iter()
        .filter(|r| r.employee_id == employee_id && month.contains(r.date))
    {
        summary.total_days += 1;
        match record.status {
            AttendanceStatus::Present => summary.present_days += 1,
            AttendanceStatus::Late => summary.late_days += 1,
            AttendanceStatus::Absent => summary.absent_days += 1,
            AttendanceStatus::OnLeave => summary.leave_days += 1,
            AttendanceStatus::HalfDay => summary.half_days += 1,
        }

        if let (Some(check_in), Some(check_out)) = (record.check_in, record.check_out) {
            match elapsed(check_in, check_out) {
                Ok(span) => worked = worked + span,
                Err(e) => warn!(record_id = record.id, error = %e, "Skipping unusable punch pair"),
            }
        }
    }

    summary.total_minutes = worked.minutes();
    summary.total_hours = (worked.as_hours() * 100.0).round() / 100.0;
    summary.total_hours_display = worked.to_string();
    summary.attendance_percentage =
        attendance_percentage(summary.present_days + summary.late_days, summary.total_days);
    summary
}

pub fn daily_stats<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> DailyStats {
    records.into_iter().fold(DailyStats::default(), |mut stats, r| {
        stats.total += 1;
        match r.status {
            AttendanceStatus::Present => stats.present += 1,
            AttendanceStatus::Late => stats.late += 1,
            AttendanceStatus::Absent => stats.absent += 1,
            AttendanceStatus::OnLeave => stats.on_leave += 1,
            AttendanceStatus::HalfDay => stats.half_day += 1,
        }
        stats
    })
}
