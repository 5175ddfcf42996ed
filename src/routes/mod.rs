pub mod health;
pub mod not_found;
pub mod tasks;
pub mod users;

use actix_web::{error::InternalError, http::StatusCode, web, HttpRequest};
use serde_json::json;

use crate::auth::AuthMiddleware;
use crate::error::AppError;

/// Registers the versioned API, the health check, and the not-found fallback.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health::health)
        .service(
            web::scope("/v1")
                .service(
                    web::scope("/tasks")
                        .wrap(AuthMiddleware)
                        .service(tasks::get_tasks)
                        .service(tasks::create_task)
                        .service(tasks::get_task)
                        .service(tasks::replace_task)
                        .service(tasks::patch_task)
                        .service(tasks::delete_task),
                )
                .service(
                    web::scope("/users")
                        .service(users::create_user)
                        .service(users::login)
                        .service(users::replace_user)
                        .service(users::patch_user)
                        .service(users::delete_user),
                ),
        )
        .default_service(web::route().to(not_found::not_found));
}

/// Rejects unreadable JSON bodies with a `GenericException`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        let message = err.to_string();
        let error = AppError::generic_with(
            "Invalid request body.",
            StatusCode::BAD_REQUEST,
            json!({ "global": [message] }),
        );
        InternalError::from_response(err, actix_web::ResponseError::error_response(&error)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::header, test, App};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;

    use crate::config::Config;

    fn test_config() -> Config {
        Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://localhost/unused".to_string()),
            _ => None,
        })
        .unwrap()
    }

    macro_rules! test_app {
        () => {{
            let pool = PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .unwrap();
            test::init_service(
                App::new()
                    .app_data(web::Data::new(pool))
                    .app_data(web::Data::new(test_config()))
                    .configure(config),
            )
            .await
        }};
    }

    #[actix_rt::test]
    async fn test_unknown_route_is_route_not_found() {
        let app = test_app!();
        let req = test::TestRequest::get().uri("/v1/nothing?x=1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["VERSION"], "V1");
        assert_eq!(json["name"], "RouteNotFoundException");
        assert_eq!(json["message"], "route /v1/nothing?x=1 does not exist on this server");
        assert_eq!(json["data"]["help"], "Method: GET");
    }

    #[actix_rt::test]
    async fn test_malformed_login_body_is_generic_bad_request() {
        let app = test_app!();
        let req = test::TestRequest::post()
            .uri("/v1/users/auth")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["name"], "GenericException");
        assert_eq!(json["statusCode"], 400);
        assert!(json["data"]["global"].is_array());
    }
}
