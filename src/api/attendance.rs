use crate::{
    api::{leave_request::fetch_approved_leave, month_or_current, month_period, today},
    auth::auth::AuthUser,
    config::Config,
    domain::{
        clock::{ClockTime, elapsed},
        monthly,
        period::Period,
        punch::{self, AttendanceChange},
        quota,
    },
    error::{ApiError, is_duplicate},
    model::attendance::{AttendanceRecord, AttendanceRow, AttendanceStatus},
    utils::retry::{RetryPolicy, with_retry},
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Defaults to the caller; HR/Admin may omit it to list everyone
    pub employee_id: Option<u64>,
    /// Single day; cannot be combined with month/year
    #[param(value_type = Option<String>, format = "date", example = "2024-03-01")]
    pub date: Option<NaiveDate>,
    /// 1-12, together with `year`
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl AttendanceQuery {
    /// Day, explicit month, or the current month when nothing is given.
    fn window(&self, today: NaiveDate) -> Result<Period, ApiError> {
        match (self.date, self.month, self.year) {
            (Some(date), None, None) => Ok(Period::day(date)),
            (Some(_), _, _) => Err(ApiError::validation(
                "Use either date or month/year, not both",
            )),
            (None, month, year) => month_or_current(month, year, today),
        }
    }
}

/// Record as returned by the API, with the worked span once both punches exist.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    #[schema(example = "8:30")]
    pub worked_hours: Option<String>,
}

impl From<AttendanceRecord> for AttendanceView {
    fn from(record: AttendanceRecord) -> Self {
        let worked_hours = match (record.check_in, record.check_out) {
            (Some(check_in), Some(check_out)) => {
                elapsed(check_in, check_out).ok().map(|w| w.to_string())
            }
            _ => None,
        };
        Self {
            record,
            worked_hours,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PunchIn {
    /// Defaults to the caller's own employee id
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date", example = "2024-03-01")]
    pub date: Option<NaiveDate>,
    /// Present/Late are derived from the check-in; other values are HR/Admin only
    pub status: Option<AttendanceStatus>,
    /// HR/Admin only; self punch-ins use the current time
    #[schema(value_type = Option<String>, example = "09:45")]
    pub check_in: Option<ClockTime>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAttendance {
    #[schema(value_type = Option<String>, example = "18:15")]
    pub check_out: Option<ClockTime>,
    /// HR/Admin only
    #[schema(value_type = Option<String>, example = "09:30")]
    pub check_in: Option<ClockTime>,
    /// HR/Admin only
    pub status: Option<AttendanceStatus>,
}

impl From<UpdateAttendance> for AttendanceChange {
    fn from(u: UpdateAttendance) -> Self {
        AttendanceChange {
            check_in: u.check_in,
            check_out: u.check_out,
            status: u.status,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub employee_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    pub month: u32,
    pub year: i32,
    pub employee_id: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResponse {
    #[schema(value_type = Vec<String>, example = json!(["2024-03-05", "2024-03-06"]))]
    pub leave_days: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Required for HR/Admin, defaults to the caller otherwise
    pub employee_id: Option<u64>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

const UPDATE_RECORD: &str = r#"
    UPDATE attendance
    SET status = ?, check_in = ?, check_out = ?
    WHERE id = ?
"#;

const UPDATE_OPEN_RECORD: &str = r#"
    UPDATE attendance
    SET status = ?, check_in = ?, check_out = ?
    WHERE id = ?
    AND check_out IS NULL
"#;

/// Employees may only close an open record; HR/Admin corrections overwrite.
fn update_statement(punch_out_only: bool) -> &'static str {
    if punch_out_only {
        UPDATE_OPEN_RECORD
    } else {
        UPDATE_RECORD
    }
}

async fn fetch_record(
    pool: &MySqlPool,
    policy: RetryPolicy,
    id: u64,
) -> Result<AttendanceRecord, ApiError> {
    let row = with_retry(policy, "fetch_attendance", move || {
        sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT id, employee_id, date, status, check_in, check_out
            FROM attendance
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Attendance record not found".into()))?;

    Ok(AttendanceRecord::try_from(row)?)
}

async fn fetch_range(
    pool: &MySqlPool,
    policy: RetryPolicy,
    period: Period,
    employee_id: Option<u64>,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let rows = with_retry(policy, "list_attendance", move || {
        sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT id, employee_id, date, status, check_in, check_out
            FROM attendance
            WHERE date BETWEEN ? AND ?
            AND (? IS NULL OR employee_id = ?)
            ORDER BY date, employee_id
            "#,
        )
        .bind(period.start())
        .bind(period.end())
        .bind(employee_id)
        .bind(employee_id)
        .fetch_all(pool)
    })
    .await?;

    rows.into_iter()
        .map(AttendanceRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::from)
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance records, ordered by date", body = [AttendanceView]),
        (status = 400, description = "Conflicting or invalid date filters"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let window = query.window(today())?;
    let employee_id = auth.scope_employee(query.employee_id)?;

    let records = fetch_range(
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        window,
        employee_id,
    )
    .await?;

    let views: Vec<AttendanceView> = records.into_iter().map(AttendanceView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

/// Punch in (or record a day as HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body(
        content = PunchIn,
        description = "Punch-in payload; every field is optional for a self punch-in",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceView),
        (status = 400, description = "Invalid time or status"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Attendance already recorded for this day", body = Object, example = json!({
            "error": "conflict",
            "message": "Attendance already recorded for this day"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(
    name = "attendance_punch_in",
    skip(auth, pool, config, payload),
    fields(user_id = auth.user_id)
)]
pub async fn punch_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<PunchIn>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let employee_id = match payload.employee_id {
        Some(id) => {
            auth.ensure_can_access(id)?;
            id
        }
        None => auth.require_employee_id()?,
    };

    if payload.status.is_some_and(|s| !s.is_derived()) {
        auth.require_hr_or_admin()?;
    }
    // Self punch-ins are stamped with the server clock
    if payload.check_in.is_some() && !auth.is_hr_or_admin() {
        return Err(ApiError::Forbidden(
            "Only HR/Admin can set checkIn; punch-in uses the current time".into(),
        ));
    }

    let now = Local::now().naive_local();
    let date = payload.date.unwrap_or(now.date());
    if date != now.date() && !auth.is_hr_or_admin() {
        return Err(ApiError::Forbidden(
            "Employees can only punch in for today".into(),
        ));
    }

    let entry = punch::resolve_punch_in(
        payload.status,
        payload.check_in,
        ClockTime::from(now.time()),
        config.late_cutoff,
    )?;

    let pool = pool.get_ref();
    let status = entry.status.db_value();
    let check_in = entry.check_in.map(ClockTime::to_naive_time);

    // Inserts are not idempotent; a lost acknowledgement must not be replayed
    let result = with_retry(
        RetryPolicy::from(config.get_ref()).single_attempt(),
        "insert_attendance",
        move || {
            sqlx::query(
                r#"
                INSERT INTO attendance (employee_id, date, status, check_in)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(employee_id)
            .bind(date)
            .bind(status)
            .bind(check_in)
            .execute(pool)
        },
    )
    .await;

    let done = match result {
        Ok(done) => done,
        // One record per employee and day
        Err(e) if is_duplicate(&e) => {
            return Err(ApiError::Conflict(
                "Attendance already recorded for this day".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let record = AttendanceRecord {
        id: done.last_insert_id(),
        employee_id,
        date,
        status: entry.status,
        check_in: entry.check_in,
        check_out: None,
    };

    info!(employee_id, %date, status, "Attendance recorded");
    Ok(HttpResponse::Created().json(AttendanceView::from(record)))
}

/// Punch out, or correct a record as HR/Admin
#[utoipa::path(
    patch,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Record updated", body = AttendanceView),
        (status = 400, description = "Empty update or check-out before check-in"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "Already checked out")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(
    name = "attendance_update",
    skip(auth, pool, config, path, payload),
    fields(user_id = auth.user_id)
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let change = AttendanceChange::from(payload.into_inner());

    if change.is_empty() {
        return Err(ApiError::validation("Provide checkOut, checkIn or status"));
    }
    if change.is_override() {
        auth.require_hr_or_admin()?;
    }
    if let (Some(check_in), Some(check_out)) = (change.check_in, change.check_out) {
        elapsed(check_in, check_out)?;
    }

    let pool = pool.get_ref();
    let policy = RetryPolicy::from(config.get_ref());

    let current = fetch_record(pool, policy, id).await?;
    auth.ensure_can_access(current.employee_id)?;
    if !auth.is_hr_or_admin() && current.check_out.is_some() {
        return Err(ApiError::Conflict("Already checked out".into()));
    }

    let updated = punch::apply_change(&current, &change, config.late_cutoff)?;

    let status = updated.status.db_value();
    let check_in = updated.check_in.map(ClockTime::to_naive_time);
    let check_out = updated.check_out.map(ClockTime::to_naive_time);

    let punch_out_only = !auth.is_hr_or_admin();
    let sql = update_statement(punch_out_only);

    let done = with_retry(policy, "update_attendance", move || {
        sqlx::query(sql)
            .bind(status)
            .bind(check_in)
            .bind(check_out)
            .bind(id)
            .execute(pool)
    })
    .await?;

    // A concurrent punch-out landed between the read and the write
    if punch_out_only && done.rows_affected() == 0 {
        return Err(ApiError::Conflict("Already checked out".into()));
    }

    info!(
        attendance_id = id,
        employee_id = updated.employee_id,
        status,
        "Attendance updated"
    );
    Ok(HttpResponse::Ok().json(AttendanceView::from(updated)))
}

/// Delete an attendance record (Admin override)
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let id = path.into_inner();
    let pool = pool.get_ref();

    let done = with_retry(
        RetryPolicy::from(config.get_ref()),
        "delete_attendance",
        move || {
            sqlx::query("DELETE FROM attendance WHERE id = ?")
                .bind(id)
                .execute(pool)
        },
    )
    .await?;

    if done.rows_affected() == 0 {
        return Err(ApiError::NotFound("Attendance record not found".into()));
    }

    info!(attendance_id = id, user_id = auth.user_id, "Attendance deleted by admin");
    Ok(HttpResponse::NoContent().finish())
}

/// Status counts for one day
#[utoipa::path(
    get,
    path = "/api/attendance/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Counts per status", body = DailyStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    let date = query.date.unwrap_or_else(today);

    let records = fetch_range(
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        Period::day(date),
        employee_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(monthly::daily_stats(&records)))
}

/// Days covered by approved leave in a month
#[utoipa::path(
    get,
    path = "/api/attendance/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Approved leave days", body = CalendarResponse),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_calendar(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<CalendarQuery>,
) -> Result<HttpResponse, ApiError> {
    let period = month_period(query.year, query.month)?;
    let employee_id = auth.scope_employee(query.employee_id)?;

    let approved = fetch_approved_leave(
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        period,
        employee_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(CalendarResponse {
        leave_days: quota::leave_days(&approved, &period),
    }))
}

/// Monthly attendance summary for one employee
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Counts, worked hours and attendance percentage", body = MonthlySummary),
        (status = 400, description = "Missing employee or invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, ApiError> {
    let month = month_or_current(query.month, query.year, today())?;
    let employee_id = auth
        .scope_employee(query.employee_id)?
        .ok_or_else(|| ApiError::validation("employeeId is required"))?;

    let records = fetch_range(
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        month,
        Some(employee_id),
    )
    .await?;

    Ok(HttpResponse::Ok().json(monthly::summarize_month(employee_id, month, &records)))
}
