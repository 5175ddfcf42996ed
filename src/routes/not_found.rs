use actix_web::HttpRequest;

use crate::error::AppError;

/// Fallback for requests no route matched.
pub async fn not_found(req: HttpRequest) -> Result<&'static str, AppError> {
    Err(AppError::route_not_found(&req))
}
