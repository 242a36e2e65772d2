use crate::api::attendance::{AttendanceView, CalendarResponse, PunchIn, UpdateAttendance};
use crate::api::leave_quota::LeaveQuotaResponse;
use crate::api::leave_request::{CreateLeave, DecisionBody, LeaveListResponse};
use crate::domain::monthly::{DailyStats, MonthlySummary};
use crate::domain::quota::{LeaveBalance, QuotaPeriod};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::leave_request::{LeaveDuration, LeaveRequest, LeaveStatus, LeaveType};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance & Leave API",
        version = "1.0.0",
        description = r#"
## Attendance and leave core of the HRM system

### Key Features
- **Attendance**
  - Punch in and out; Present/Late is derived from the check-in time
  - Daily status counts, monthly summaries and an approved-leave calendar
- **Leave**
  - Submit, withdraw, approve and reject leave requests
  - Remaining balance per leave type

### Security
Every endpoint is protected using **JWT Bearer authentication**.
Employees only see their own records; **Admin** and **HR** see everyone
and decide leave.

### Response Format
- JSON with camelCase fields, dates as `yyyy-MM-dd`, times as `HH:MM`
- Errors as `{"error": <kind>, "message": <text>}`
"#,
    ),
    paths(
        crate::api::attendance::list_attendance,
        crate::api::attendance::punch_in,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::attendance_stats,
        crate::api::attendance::attendance_calendar,
        crate::api::attendance::attendance_summary,

        crate::api::leave_quota::leave_quota,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::delete_leave
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceView,
            AttendanceStatus,
            PunchIn,
            UpdateAttendance,
            DailyStats,
            MonthlySummary,
            CalendarResponse,
            LeaveRequest,
            LeaveType,
            LeaveDuration,
            LeaveStatus,
            CreateLeave,
            DecisionBody,
            LeaveListResponse,
            LeaveQuotaResponse,
            LeaveBalance,
            QuotaPeriod
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Attendance", description = "Attendance APIs"),
        (name = "Leave", description = "Leave request and quota APIs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by every path.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
