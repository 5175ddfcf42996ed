use std::time::Instant;

use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

/// When the service started; registered as app data.
#[derive(Debug, Clone, Copy)]
pub struct Uptime(pub Instant);

impl Uptime {
    pub fn now() -> Self {
        Uptime(Instant::now())
    }
}

/// Health check endpoint
///
/// Always answers `200 OK`; `healthy` is false when the database cannot be
/// reached.
#[get("/healthcheck")]
pub async fn health(pool: web::Data<PgPool>, uptime: web::Data<Uptime>) -> impl Responder {
    let (database_status, healthy) = match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => ("OK".to_string(), true),
        Err(e) => {
            log::warn!("healthcheck database probe failed: {}", e);
            ("db not connected.".to_string(), false)
        }
    };

    let statuses = json!({
        "database": { "status": database_status },
        "service": {
            "status": "OK",
            "uptime": uptime.0.elapsed().as_secs_f64()
        },
        "healthy": healthy,
        "timestamp": Utc::now()
    });
    log::debug!("healthcheck: {}", statuses);

    HttpResponse::Ok().json(statuses)
}
