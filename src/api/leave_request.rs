use crate::{
    auth::auth::AuthUser,
    config::Config,
    domain::{
        period::Period,
        workflow::{self, LeaveDecision},
    },
    error::ApiError,
    model::leave_request::{LeaveDuration, LeaveRequest, LeaveRequestRow, LeaveStatus, LeaveType},
    utils::retry::{RetryPolicy, with_retry},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

const REASON_MAX_CHARS: usize = 1000;
const COMMENT_MAX_CHARS: usize = 500;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-06", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "casual")]
    pub leave_type: LeaveType,
    /// Defaults to `fullDay`; partial durations cover a single day
    #[serde(default)]
    pub leave_duration: LeaveDuration,
    #[schema(example = "Family function")]
    pub reason: String,
}

impl CreateLeave {
    fn validate(&self) -> Result<(), ApiError> {
        if self.start_date > self.end_date {
            return Err(ApiError::validation("startDate cannot be after endDate"));
        }
        if self.leave_duration.is_partial() && self.start_date != self.end_date {
            return Err(ApiError::validation(
                "Half-day leave must start and end on the same day",
            ));
        }
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(ApiError::validation("reason is required"));
        }
        if reason.chars().count() > REASON_MAX_CHARS {
            return Err(ApiError::validation(format!(
                "reason must be at most {REASON_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBody {
    #[schema(example = "Enjoy your time off")]
    pub admin_comment: Option<String>,
}

impl DecisionBody {
    /// Trimmed comment, `None` when blank.
    fn comment(&self) -> Result<Option<String>, ApiError> {
        let Some(comment) = self.admin_comment.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if comment.chars().count() > COMMENT_MAX_CHARS {
            return Err(ApiError::validation(format!(
                "adminComment must be at most {COMMENT_MAX_CHARS} characters"
            )));
        }
        Ok((!comment.is_empty()).then(|| comment.to_owned()))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by employee ID; employees only ever see their own requests
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Items per page, at most 100
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

// Typed values for the dynamically built WHERE clause
#[derive(Clone, Copy)]
enum FilterValue {
    U64(u64),
    Str(&'static str),
}

pub(crate) async fn fetch_leave(
    pool: &MySqlPool,
    policy: RetryPolicy,
    id: u64,
) -> Result<LeaveRequest, ApiError> {
    let row = with_retry(policy, "fetch_leave", move || {
        sqlx::query_as::<_, LeaveRequestRow>(
            r#"
            SELECT id, employee_id, start_date, end_date, leave_type, leave_duration,
                   reason, status, admin_comment, created_at
            FROM leave_requests
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Leave request not found".into()))?;

    Ok(LeaveRequest::try_from(row)?)
}

/// Approved requests overlapping `period`, optionally for one employee.
pub(crate) async fn fetch_approved_leave(
    pool: &MySqlPool,
    policy: RetryPolicy,
    period: Period,
    employee_id: Option<u64>,
) -> Result<Vec<LeaveRequest>, ApiError> {
    let rows = with_retry(policy, "fetch_approved_leave", move || {
        sqlx::query_as::<_, LeaveRequestRow>(
            r#"
            SELECT id, employee_id, start_date, end_date, leave_type, leave_duration,
                   reason, status, admin_comment, created_at
            FROM leave_requests
            WHERE status = 'approved'
            AND start_date <= ?
            AND end_date >= ?
            AND (? IS NULL OR employee_id = ?)
            ORDER BY start_date
            "#,
        )
        .bind(period.end())
        .bind(period.start())
        .bind(employee_id)
        .bind(employee_id)
        .fetch_all(pool)
    })
    .await?;

    rows.into_iter()
        .map(LeaveRequest::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::from)
}

/// Submit a leave request for the caller
#[utoipa::path(
    post,
    path = "/api/leave-requests",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted, status pending", body = LeaveRequest),
        (status = 400, description = "Invalid dates, duration or reason"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(
    name = "leave_create",
    skip(auth, pool, config, payload),
    fields(user_id = auth.user_id)
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = auth.require_employee_id()?;
    payload.validate()?;

    let pool = pool.get_ref();
    let policy = RetryPolicy::from(config.get_ref());

    let start_date = payload.start_date;
    let end_date = payload.end_date;
    let leave_type = payload.leave_type.db_value();
    let leave_duration = payload.leave_duration.db_value();
    let reason = payload.reason.trim();

    // Inserts are not idempotent; a lost acknowledgement must not be replayed
    let done = with_retry(policy.single_attempt(), "insert_leave", move || {
        sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, start_date, end_date, leave_type, leave_duration, reason)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(start_date)
        .bind(end_date)
        .bind(leave_type)
        .bind(leave_duration)
        .bind(reason)
        .execute(pool)
    })
    .await?;

    let leave = fetch_leave(pool, policy, done.last_insert_id()).await?;

    info!(leave_id = leave.id, employee_id, leave_type, "Leave request submitted");
    Ok(HttpResponse::Created().json(leave))
}

async fn decide(
    auth: AuthUser,
    pool: &MySqlPool,
    policy: RetryPolicy,
    leave_id: u64,
    body: DecisionBody,
    decision: LeaveDecision,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()?;
    let comment = body.comment()?;

    let current = fetch_leave(pool, policy, leave_id).await?;
    let next = workflow::decide(current.status, decision)?;

    let status = next.db_value();
    let admin_comment = comment.as_deref();
    let decided_by = auth.user_id;

    let done = with_retry(policy, "decide_leave", move || {
        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, admin_comment = ?, decided_by = ?, decided_at = NOW()
            WHERE id = ?
            AND status = 'pending'
            "#,
        )
        .bind(status)
        .bind(admin_comment)
        .bind(decided_by)
        .bind(leave_id)
        .execute(pool)
    })
    .await?;

    // Another reviewer got there first
    if done.rows_affected() == 0 {
        return Err(ApiError::Conflict("Leave request was already decided".into()));
    }

    let leave = fetch_leave(pool, policy, leave_id).await?;
    info!(leave_id, decided_by, status, "Leave request decided");
    Ok(HttpResponse::Ok().json(leave))
}

/// Approve a pending leave request (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/leave-requests/{id}/approve",
    params(
        ("id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body(content = DecisionBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided", body = Object, example = json!({
            "error": "conflict",
            "message": "Leave request is already rejected"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: Option<web::Json<DecisionBody>>,
) -> Result<HttpResponse, ApiError> {
    decide(
        auth,
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        path.into_inner(),
        body.map(web::Json::into_inner).unwrap_or_default(),
        LeaveDecision::Approve,
    )
    .await
}

/// Reject a pending leave request (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/leave-requests/{id}/reject",
    params(
        ("id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body(content = DecisionBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: Option<web::Json<DecisionBody>>,
) -> Result<HttpResponse, ApiError> {
    decide(
        auth,
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        path.into_inner(),
        body.map(web::Json::into_inner).unwrap_or_default(),
        LeaveDecision::Reject,
    )
    .await
}

/// Withdraw a pending leave request (owner only)
#[utoipa::path(
    delete,
    path = "/api/leave-requests/{id}",
    params(
        ("id" = u64, Path, description = "ID of the leave request to withdraw")
    ),
    responses(
        (status = 204, description = "Leave request withdrawn"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the requester"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave_id = path.into_inner();
    let pool = pool.get_ref();
    let policy = RetryPolicy::from(config.get_ref());

    let leave = fetch_leave(pool, policy, leave_id).await?;
    if auth.employee_id != Some(leave.employee_id) {
        return Err(ApiError::Forbidden(
            "Only the requester can withdraw a leave request".into(),
        ));
    }
    workflow::ensure_withdrawable(leave.status)?;

    let done = with_retry(policy, "delete_leave", move || {
        sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = 'pending'")
            .bind(leave_id)
            .execute(pool)
    })
    .await?;

    if done.rows_affected() == 0 {
        return Err(ApiError::Conflict("Leave request was already decided".into()));
    }

    info!(leave_id, employee_id = leave.employee_id, "Leave request withdrawn");
    Ok(HttpResponse::NoContent().finish())
}

/// Get one leave request
#[utoipa::path(
    get,
    path = "/api/leave-requests/{id}",
    params(
        ("id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "error": "not_found",
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave = fetch_leave(
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        path.into_inner(),
    )
    .await?;
    auth.ensure_can_access(leave.employee_id)?;

    Ok(HttpResponse::Ok().json(leave))
}

/// List leave requests, newest first
#[utoipa::path(
    get,
    path = "/api/leave-requests",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = auth.scope_employee(query.employee_id)?;

    // Pagination
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // WHERE clause
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.db_value()));
    }

    let pool = pool.get_ref();
    let policy = RetryPolicy::from(config.get_ref());
    let args = args.as_slice();

    // COUNT query
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_sql}");
    let count_sql = count_sql.as_str();

    let total = with_retry(policy, "count_leave", move || {
        let mut count_q = sqlx::query_scalar::<_, i64>(count_sql);
        for arg in args {
            count_q = match *arg {
                FilterValue::U64(v) => count_q.bind(v),
                FilterValue::Str(s) => count_q.bind(s),
            };
        }
        count_q.fetch_one(pool)
    })
    .await?;

    // DATA query
    let data_sql = format!(
        r#"
        SELECT id, employee_id, start_date, end_date, leave_type, leave_duration,
               reason, status, admin_comment, created_at
        FROM leave_requests
        {where_sql}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    );
    let data_sql = data_sql.as_str();

    let rows = with_retry(policy, "list_leave", move || {
        let mut data_q = sqlx::query_as::<_, LeaveRequestRow>(data_sql);
        for arg in args {
            data_q = match *arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Str(s) => data_q.bind(s),
            };
        }
        data_q.bind(per_page).bind(offset).fetch_all(pool)
    })
    .await?;

    let data = rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use crate::routes;
    use actix_web::test::{TestRequest, call_service, init_service};
    use actix_web::{App, http::StatusCode};
    use serde_json::json;

    macro_rules! app {
        () => {{
            let (pool, config) = app_data();
            let cfg = config.get_ref().clone();
            init_service(
                App::new()
                    .app_data(pool)
                    .app_data(config)
                    .configure(move |c| routes::configure(c, &cfg)),
            )
            .await
        }};
    }

    fn request(start: (u32, u32), end: (u32, u32), duration: LeaveDuration) -> CreateLeave {
        CreateLeave {
            start_date: NaiveDate::from_ymd_opt(2024, start.0, start.1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, end.0, end.1).unwrap(),
            leave_type: LeaveType::Casual,
            leave_duration: duration,
            reason: "Family function".into(),
        }
    }

    #[test]
    fn create_validation() {
        assert!(request((3, 5), (3, 6), LeaveDuration::FullDay).validate().is_ok());
        assert!(request((3, 5), (3, 5), LeaveDuration::FirstHalf).validate().is_ok());
        assert!(request((3, 6), (3, 5), LeaveDuration::FullDay).validate().is_err());
        assert!(request((3, 5), (3, 6), LeaveDuration::HalfDay).validate().is_err());

        let mut blank = request((3, 5), (3, 5), LeaveDuration::FullDay);
        blank.reason = "   ".into();
        assert!(blank.validate().is_err());

        let mut long = request((3, 5), (3, 5), LeaveDuration::FullDay);
        long.reason = "x".repeat(REASON_MAX_CHARS + 1);
        assert!(long.validate().is_err());
    }

    #[test]
    fn decision_comment_is_trimmed() {
        let body = |c: Option<&str>| DecisionBody {
            admin_comment: c.map(String::from),
        };
        assert_eq!(body(None).comment().unwrap(), None);
        assert_eq!(body(Some("  ")).comment().unwrap(), None);
        assert_eq!(body(Some(" ok ")).comment().unwrap().as_deref(), Some("ok"));
        assert!(body(Some(&"x".repeat(COMMENT_MAX_CHARS + 1))).comment().is_err());
    }

    #[test]
    fn duration_defaults_to_full_day() {
        let payload: CreateLeave = serde_json::from_value(json!({
            "startDate": "2024-03-05",
            "endDate": "2024-03-05",
            "leaveType": "workFromHome",
            "reason": "Plumber visit"
        }))
        .unwrap();
        assert_eq!(payload.leave_duration, LeaveDuration::FullDay);
        assert_eq!(payload.leave_type, LeaveType::WorkFromHome);
    }

    #[actix_web::test]
    async fn invalid_submissions_are_rejected_before_storage() {
        let app = app!();
        for body in [
            json!({ "startDate": "2024-03-06", "endDate": "2024-03-05", "leaveType": "sick", "reason": "Flu" }),
            json!({ "startDate": "2024-03-05", "endDate": "2024-03-07", "leaveType": "sick",
                    "leaveDuration": "halfDay", "reason": "Flu" }),
            json!({ "startDate": "2024-03-05", "endDate": "2024-03-05", "leaveType": "holiday", "reason": "Flu" }),
        ] {
            let req = TestRequest::post()
                .uri("/api/leave-requests")
                .peer_addr(peer())
                .insert_header(bearer(EMPLOYEE, Some(5)))
                .set_json(body)
                .to_request();
            assert_eq!(call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn employees_cannot_decide() {
        let app = app!();
        for action in ["approve", "reject"] {
            let req = TestRequest::put()
                .uri(&format!("/api/leave-requests/1/{action}"))
                .peer_addr(peer())
                .insert_header(bearer(EMPLOYEE, Some(5)))
                .set_json(json!({ "adminComment": "ok" }))
                .to_request();
            assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        }
    }

    #[actix_web::test]
    async fn overlong_comment_is_rejected() {
        let app = app!();
        let req = TestRequest::put()
            .uri("/api/leave-requests/1/approve")
            .peer_addr(peer())
            .insert_header(bearer(HR, None))
            .set_json(json!({ "adminComment": "x".repeat(COMMENT_MAX_CHARS + 1) }))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_is_scoped_for_employees() {
        let app = app!();
        let req = TestRequest::get()
            .uri("/api/leave-requests?employeeId=6")
            .peer_addr(peer())
            .insert_header(bearer(EMPLOYEE, Some(5)))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let bad_status = TestRequest::get()
            .uri("/api/leave-requests?status=cancelled")
            .peer_addr(peer())
            .insert_header(bearer(HR, None))
            .to_request();
        assert_eq!(call_service(&app, bad_status).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unlinked_user_cannot_submit() {
        let app = app!();
        let req = TestRequest::post()
            .uri("/api/leave-requests")
            .peer_addr(peer())
            .insert_header(bearer(ADMIN, None))
            .set_json(json!({ "startDate": "2024-03-05", "endDate": "2024-03-05",
                              "leaveType": "sick", "reason": "Flu" }))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
