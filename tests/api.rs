//! Envelope behaviour of the running server that does not need a database.

use std::net::TcpListener;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{middleware::Logger, rt, web, App, HttpServer};
use chrono::Duration as TokenTtl;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use taskdesk::auth::generate_token;
use taskdesk::config::Config;
use taskdesk::routes::{self, health::Uptime};
use uuid::Uuid;

const SECRET: &str = "api_test_secret";

struct TestServer {
    base_url: String,
    handle: ServerHandle,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Starts the full application on a random port, backed by a pool that can
/// never connect.
fn spawn_app() -> TestServer {
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => Some("postgres://nobody@127.0.0.1:1/unreachable".to_string()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        _ => None,
    })
    .expect("test configuration is valid");
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(300))
        .connect_lazy(&config.database_url)
        .expect("lazy pool");

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let config = web::Data::new(config);
    let uptime = web::Data::new(Uptime::now());
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .app_data(uptime.clone())
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen")
    .run();

    let handle = server.handle();
    rt::spawn(server);

    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        handle,
    }
}

async fn get_json(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.expect("JSON body");
    (status, body)
}

#[actix_rt::test]
async fn test_tasks_require_an_authorization_header() {
    let server = spawn_app();
    let client = reqwest::Client::new();

    let (status, body) = get_json(
        client
            .post(server.url("/v1/tasks"))
            .json(&json!({ "title": "Unauthorized Task" }))
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;

    assert_eq!(status, 401);
    assert_eq!(
        body,
        json!({
            "VERSION": "V1",
            "statusCode": 401,
            "name": "UnauthorizedException",
            "message": "Error decoding token",
            "data": { "global": "You must send an Authorization header with `Bearer <token>`." }
        })
    );

    server.handle.stop(false).await;
}

#[actix_rt::test]
async fn test_bad_authorization_headers() {
    let server = spawn_app();
    let client = reqwest::Client::new();

    let cases = [
        ("Token abc", "Authorization header must follow format `Bearer <token>`"),
        ("Bearer not-a-jwt", "Unable to verify token."),
    ];

    for (header, expected) in cases {
        let (status, body) = get_json(
            client
                .get(server.url("/v1/tasks"))
                .header("Authorization", header)
                .send()
                .await
                .expect("Failed to send request"),
        )
        .await;

        assert_eq!(status, 401, "header {:?}", header);
        assert_eq!(body["data"]["global"], expected);
    }

    let expired = {
        let claims = taskdesk::auth::Claims {
            sub: Uuid::new_v4(),
            exp: (chrono::Utc::now() - TokenTtl::hours(2)).timestamp() as usize,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    };
    let (status, body) = get_json(
        client
            .get(server.url("/v1/tasks"))
            .bearer_auth(expired)
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["data"]["global"], "token expired.");

    server.handle.stop(false).await;
}

#[actix_rt::test]
async fn test_database_failures_hide_their_detail() {
    let server = spawn_app();
    let token = generate_token(Uuid::new_v4(), SECRET, TokenTtl::hours(1)).unwrap();

    let (status, body) = get_json(
        reqwest::Client::new()
            .get(server.url("/v1/tasks"))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;

    assert_eq!(status, 500);
    assert_eq!(
        body,
        json!({
            "VERSION": "V1",
            "statusCode": 500,
            "name": "UnhandledException",
            "message": "Internal Server Error",
            "data": {}
        })
    );

    server.handle.stop(false).await;
}

#[actix_rt::test]
async fn test_unknown_route() {
    let server = spawn_app();

    let (status, body) = get_json(
        reqwest::Client::new()
            .delete(server.url("/v2/anything"))
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;

    assert_eq!(status, 404);
    assert_eq!(body["name"], "RouteNotFoundException");
    assert_eq!(body["message"], "route /v2/anything does not exist on this server");
    assert_eq!(body["data"], json!({ "help": "Method: DELETE" }));

    server.handle.stop(false).await;
}

#[actix_rt::test]
async fn test_login_validation_does_not_need_the_database() {
    let server = spawn_app();

    let (status, body) = get_json(
        reqwest::Client::new()
            .post(server.url("/v1/users/auth"))
            .json(&json!({ "email": "not-an-email" }))
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({
            "VERSION": "V1",
            "statusCode": 400,
            "name": "GenericException",
            "message": "User authentication failed.",
            "data": {
                "email": ["`email` is invalid."],
                "password": ["`password` is invalid."]
            }
        })
    );

    server.handle.stop(false).await;
}

#[actix_rt::test]
async fn test_healthcheck_reports_database_down() {
    let server = spawn_app();

    let (status, body) = get_json(
        reqwest::Client::new()
            .get(server.url("/healthcheck"))
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["healthy"], false);
    assert_eq!(body["database"]["status"], "db not connected.");

    server.handle.stop(false).await;
}
