use std::collections::BTreeMap;

use crate::{
    api::{leave_request::fetch_approved_leave, month_period, today},
    auth::auth::AuthUser,
    config::Config,
    domain::{
        period::Period,
        quota::{self, LeaveBalance, QuotaPeriod},
    },
    error::ApiError,
    model::leave_request::LeaveType,
    utils::retry::RetryPolicy,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuotaQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
    /// Narrows the window to one month
    pub month: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "employeeId": 1000,
    "period": "annual",
    "from": "2024-01-01",
    "to": "2024-12-31",
    "quotas": {
        "casual": { "total": 1.0, "used": 1.0, "remaining": 0.0 },
        "sick": { "total": 2.0, "used": 0.5, "remaining": 1.5 }
    }
}))]
pub struct LeaveQuotaResponse {
    pub employee_id: u64,
    pub period: QuotaPeriod,
    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,
    #[schema(value_type = Object)]
    pub quotas: BTreeMap<LeaveType, LeaveBalance>,
}

/// Accounting window for a quota lookup.
fn quota_window(
    configured: QuotaPeriod,
    query: &QuotaQuery,
    today: NaiveDate,
) -> Result<(QuotaPeriod, Period), ApiError> {
    let year = query.year.unwrap_or(today.year());
    match (configured, query.month) {
        (_, Some(month)) => Ok((QuotaPeriod::Monthly, month_period(year, month)?)),
        (QuotaPeriod::Annual, None) => Period::year(year)
            .map(|p| (QuotaPeriod::Annual, p))
            .ok_or_else(|| ApiError::validation(format!("Invalid year {year}"))),
        (QuotaPeriod::Monthly, None) if query.year.is_some() => Err(ApiError::validation(
            "month is required when quotas are tracked monthly",
        )),
        (QuotaPeriod::Monthly, None) => Ok((
            QuotaPeriod::Monthly,
            month_period(today.year(), today.month())?,
        )),
    }
}

/// Remaining leave balance per type
#[utoipa::path(
    get,
    path = "/api/employees/{id}/leave-quota",
    params(
        ("id" = u64, Path, description = "Employee id"),
        QuotaQuery
    ),
    responses(
        (status = 200, description = "Balance per leave type", body = LeaveQuotaResponse),
        (status = 400, description = "Invalid year or month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_quota(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<QuotaQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();
    auth.ensure_can_access(employee_id)?;

    let (period, window) = quota_window(config.quota_period, &query, today())?;

    let approved = fetch_approved_leave(
        pool.get_ref(),
        RetryPolicy::from(config.get_ref()),
        window,
        Some(employee_id),
    )
    .await?;

    Ok(HttpResponse::Ok().json(LeaveQuotaResponse {
        employee_id,
        period,
        from: window.start(),
        to: window.end(),
        quotas: quota::compute_quotas(&config.leave_allocation, &approved, &window),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use crate::routes;
    use actix_web::test::{TestRequest, call_service, init_service};
    use actix_web::{App, http::StatusCode};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn q(year: Option<i32>, month: Option<u32>) -> QuotaQuery {
        QuotaQuery { year, month }
    }

    #[test]
    fn annual_window_defaults_to_current_year() {
        let today = date(2024, 3, 15);
        let (period, window) = quota_window(QuotaPeriod::Annual, &q(None, None), today).unwrap();
        assert_eq!(period, QuotaPeriod::Annual);
        assert_eq!((window.start(), window.end()), (date(2024, 1, 1), date(2024, 12, 31)));

        let (_, window) = quota_window(QuotaPeriod::Annual, &q(Some(2023), None), today).unwrap();
        assert_eq!(window.start(), date(2023, 1, 1));
    }

    #[test]
    fn explicit_month_narrows_window() {
        let today = date(2024, 3, 15);
        let (period, window) =
            quota_window(QuotaPeriod::Annual, &q(Some(2024), Some(2)), today).unwrap();
        assert_eq!(period, QuotaPeriod::Monthly);
        assert_eq!(window.end(), date(2024, 2, 29));
        assert!(quota_window(QuotaPeriod::Annual, &q(None, Some(13)), today).is_err());
    }

    #[test]
    fn monthly_tracking() {
        let today = date(2024, 3, 15);
        let (_, window) = quota_window(QuotaPeriod::Monthly, &q(None, None), today).unwrap();
        assert_eq!(window.start(), date(2024, 3, 1));
        assert!(quota_window(QuotaPeriod::Monthly, &q(Some(2024), None), today).is_err());
    }

    #[test]
    fn response_shape_uses_camel_case_keys() {
        use crate::domain::quota::LeaveAllocation;
        use crate::model::leave_request::{LeaveDuration, LeaveRequest, LeaveStatus};
        use chrono::{TimeZone, Utc};

        let window = Period::year(2024).unwrap();
        let casual_day = LeaveRequest {
            id: 1,
            employee_id: 5,
            start_date: date(2024, 3, 5),
            end_date: date(2024, 3, 5),
            leave_type: LeaveType::Casual,
            leave_duration: LeaveDuration::FullDay,
            reason: "Family function".into(),
            status: LeaveStatus::Approved,
            admin_comment: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        };
        let response = LeaveQuotaResponse {
            employee_id: 5,
            period: QuotaPeriod::Annual,
            from: window.start(),
            to: window.end(),
            quotas: quota::compute_quotas(&LeaveAllocation::default(), &[casual_day], &window),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["employeeId"], 5);
        assert_eq!(json["period"], "annual");
        assert_eq!(json["from"], "2024-01-01");
        assert_eq!(json["to"], "2024-12-31");
        assert_eq!(json["quotas"]["casual"]["total"], 1.0);
        assert_eq!(json["quotas"]["casual"]["used"], 1.0);
        assert_eq!(json["quotas"]["casual"]["remaining"], 0.0);
        assert_eq!(json["quotas"]["workFromHome"]["remaining"], 4.0);
        assert!(json["quotas"].get("unpaid").is_none());
    }

    #[actix_web::test]
    async fn employees_only_see_their_own_quota() {
        let (pool, config) = app_data();
        let cfg = config.get_ref().clone();
        let app = init_service(
            App::new()
                .app_data(pool)
                .app_data(config)
                .configure(move |c| routes::configure(c, &cfg)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/api/employees/6/leave-quota")
            .peer_addr(peer())
            .insert_header(bearer(EMPLOYEE, Some(5)))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let bad_month = TestRequest::get()
            .uri("/api/employees/5/leave-quota?year=2024&month=0")
            .peer_addr(peer())
            .insert_header(bearer(EMPLOYEE, Some(5)))
            .to_request();
        assert_eq!(call_service(&app, bad_month).await.status(), StatusCode::BAD_REQUEST);
    }
}
