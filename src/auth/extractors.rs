use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;

use crate::auth::{authorize, Claims};
use crate::config::Config;
use crate::error::AppError;
use crate::models::User;

/// The user a request's bearer token was issued to.
///
/// Uses the claims stored by [`AuthMiddleware`](crate::auth::AuthMiddleware)
/// when it ran, and verifies the token itself otherwise. The user must still
/// exist.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = claims_for(req);
        let pool = req.app_data::<web::Data<PgPool>>().cloned();

        Box::pin(async move {
            let claims = claims?;
            let pool = pool.ok_or_else(|| AppError::unhandled("PgPool is not registered as app data"))?;

            match User::find_by_id(&pool, claims.sub).await? {
                Some(user) => Ok(AuthenticatedUser(user)),
                None => Err(AppError::unauthorized(
                    "Authorization failed, user does not exist.",
                )),
            }
        })
    }
}

fn claims_for(req: &HttpRequest) -> Result<Claims, AppError> {
    if let Some(claims) = req.extensions().get::<Claims>() {
        return Ok(claims.clone());
    }

    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::unhandled("Config is not registered as app data"))?;
    authorize(req.headers(), &config.jwt_secret)
}
