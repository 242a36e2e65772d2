use crate::auth::auth::authenticate;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// Verifies the bearer token and stores the caller as `AuthUser`.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let authenticated = authenticate(req.headers(), &config.jwt_secret);
    match authenticated {
        Ok(auth_user) => {
            tracing::debug!(
                user_id = auth_user.user_id,
                username = %auth_user.username,
                path = %req.path(),
                "Authenticated request"
            );
            req.extensions_mut().insert(auth_user);
            next.call(req).await
        }
        Err(err) => {
            tracing::info!(path = %req.path(), error = %err, "Unauthenticated request");
            Ok(req.into_response(err.error_response()))
        }
    }
}
