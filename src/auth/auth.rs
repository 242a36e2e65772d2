use crate::{
    auth::jwt::verify_token,
    error::ApiError,
    model::role::Role,
    models::TokenType,
};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, http::header::HeaderMap};
use futures::future::{Ready, ready};

/// Caller identity placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// Reads and verifies the `Authorization: Bearer` access token.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, ApiError> {
    let header_value = headers
        .get("Authorization")
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header encoding".into()))?;

    let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized("Authorization header must start with Bearer".into())
    })?;

    let claims = verify_token(token, secret).map_err(|e| {
        tracing::debug!(error = %e, "Token rejected");
        ApiError::Unauthorized("Invalid or expired token".into())
    })?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::Unauthorized("Access token required".into()));
    }

    let role = Role::from_id(claims.role)
        .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
    })
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user: Result<AuthUser, actix_web::Error> = req
            .extensions()
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()).into());
        ready(user)
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("HR/Admin only".into()))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        self.role.is_hr_or_admin()
    }

    /// The caller's own employee id.
    pub fn require_employee_id(&self) -> Result<u64, ApiError> {
        self.employee_id
            .ok_or_else(|| ApiError::Forbidden("No employee profile".into()))
    }

    /// HR/Admin may act on anyone, everyone else only on themselves.
    pub fn ensure_can_access(&self, employee_id: u64) -> Result<(), ApiError> {
        if self.is_hr_or_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Not allowed to access another employee's records".into(),
            ))
        }
    }

    /// Resolves an optional employee filter: HR/Admin may leave it open,
    /// everyone else is pinned to their own id.
    pub fn scope_employee(&self, requested: Option<u64>) -> Result<Option<u64>, ApiError> {
        match requested {
            Some(id) => {
                self.ensure_can_access(id)?;
                Ok(Some(id))
            }
            None if self.is_hr_or_admin() => Ok(None),
            None => self.require_employee_id().map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::test_tokens::{SECRET, access, token};
    use actix_web::http::header::{AUTHORIZATION, HeaderValue};

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id,
        }
    }

    #[test]
    fn accepts_bearer_access_token() {
        let auth = authenticate(&headers(&format!("Bearer {}", access(3, Some(7)))), SECRET).unwrap();
        assert_eq!(auth.role, Role::Employee);
        assert_eq!(auth.employee_id, Some(7));
    }

    #[test]
    fn rejects_missing_malformed_and_refresh_tokens() {
        assert!(matches!(
            authenticate(&HeaderMap::new(), SECRET),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(authenticate(&headers(&access(3, None)), SECRET).is_err());
        let refresh = token(3, None, TokenType::Refresh, 900);
        assert!(authenticate(&headers(&format!("Bearer {refresh}")), SECRET).is_err());
        let bad_role = access(9, None);
        assert!(authenticate(&headers(&format!("Bearer {bad_role}")), SECRET).is_err());
    }

    #[test]
    fn employees_are_pinned_to_themselves() {
        let employee = user(Role::Employee, Some(5));
        assert_eq!(employee.scope_employee(None).unwrap(), Some(5));
        assert_eq!(employee.scope_employee(Some(5)).unwrap(), Some(5));
        assert!(matches!(employee.scope_employee(Some(6)), Err(ApiError::Forbidden(_))));

        let orphan = user(Role::Employee, None);
        assert!(orphan.scope_employee(None).is_err());
    }

    #[test]
    fn hr_sees_everyone() {
        let hr = user(Role::Hr, None);
        assert_eq!(hr.scope_employee(None).unwrap(), None);
        assert_eq!(hr.scope_employee(Some(6)).unwrap(), Some(6));
        assert!(hr.require_hr_or_admin().is_ok());
        assert!(hr.require_admin().is_err());
    }
}
