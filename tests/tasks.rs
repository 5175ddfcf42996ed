//! Task CRUD, filtering, and error envelopes against a real Postgres database.
//!
//! Run with `DATABASE_URL` pointing at a disposable database and `--ignored`.

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use dotenv::dotenv;
use serde_json::{json, Value};
use sqlx::PgPool;
use taskdesk::config::Config;
use taskdesk::routes;

async fn setup() -> (PgPool, web::Data<Config>) {
    dotenv().ok();
    let config = Config::from_env().expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to test DB");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    (pool, web::Data::new(config))
}

async fn cleanup_user(pool: &PgPool, email: &str) {
    let _ = sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await;
}

async fn register(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
) -> String {
    let req = test::TestRequest::post()
        .uri("/v1/users")
        .set_json(json!({
            "email": email,
            "password": "PasswordCrud123!",
            "profile": { "name": "crud user", "gender": "other", "timezone": "UTC" }
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED, "registration failed");
    let body: Value = test::read_body_json(resp).await;
    body["data"]["token"].as_str().unwrap().to_string()
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_task_crud_flow() {
    let (pool, config) = setup().await;
    let email = "tasks_crud@example.com";
    cleanup_user(&pool, email).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .configure(routes::config),
    )
    .await;
    let token = register(&app, email).await;

    // Create
    let req = test::TestRequest::post()
        .uri("/v1/tasks")
        .insert_header(bearer(&token))
        .set_json(json!({
            "title": "CRUD Task 1 Original",
            "description": "Initial description",
            "due": "2030-01-01",
            "categories": ["Home Chores", "ID cards"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Task Created Successfully");
    assert_eq!(body["data"]["status"], "Pending");
    assert_eq!(body["data"]["categories"], json!(["Home Chores", "ID Cards"]));
    let task_id = body["data"]["id"].as_str().unwrap().to_string();

    // Get
    let req = test::TestRequest::get()
        .uri(&format!("/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["title"], "CRUD Task 1 Original");

    // Patch
    let req = test::TestRequest::patch()
        .uri(&format!("/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .set_json(json!({ "status": "In Progress" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Task Updated Successfully");
    assert_eq!(body["data"]["status"], "In Progress");
    assert_eq!(body["data"]["title"], "CRUD Task 1 Original");

    // Put without required fields
    let req = test::TestRequest::put()
        .uri(&format!("/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Replaced", "status": "someday" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "ValidationError");
    assert_eq!(
        body["data"],
        json!({
            "description": ["`description` is required."],
            "due": ["`due` is required."],
            "status": ["`status` is invalid."]
        })
    );

    // Delete
    let req = test::TestRequest::delete()
        .uri(&format!("/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Task Deleted Successfully.");

    // Gone
    let uri = format!("/v1/tasks/{}", task_id);
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "EntityNotFoundException");
    assert_eq!(body["message"], format!("Task does not exist: {}", uri));
    assert_eq!(body["data"], json!({ "help": "Method: GET" }));

    // Malformed id
    let req = test::TestRequest::get()
        .uri("/v1/tasks/42")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "CastError");
    assert_eq!(
        body["data"],
        json!({ "id": "Cast to UUID failed for value \"42\" at path \"id\"" })
    );

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_task_listing_filters_and_validation() {
    let (pool, config) = setup().await;
    let email = "tasks_listing@example.com";
    cleanup_user(&pool, email).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .configure(routes::config),
    )
    .await;
    let token = register(&app, email).await;

    for (title, due, status) in [
        ("first", "2030-01-01", "done"),
        ("second", "2031-01-01", "pending"),
        ("third", "2032-01-01", "done"),
    ] {
        let req = test::TestRequest::post()
            .uri("/v1/tasks")
            .insert_header(bearer(&token))
            .set_json(json!({
                "title": title,
                "description": "listing",
                "due": due,
                "status": status
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    // Default order is due descending
    let req = test::TestRequest::get()
        .uri("/v1/tasks")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["third", "second", "first"]);

    // Filter and override the default direction
    let req = test::TestRequest::get()
        .uri("/v1/tasks?status=done&sort=due")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "third"]);

    // Unknown keys are all reported
    let req = test::TestRequest::get()
        .uri("/v1/tasks?badParam=1&sort=-badsort")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "VERSION": "V1",
            "statusCode": 400,
            "name": "QueryValidationError",
            "message": "Invalid Query supplied.",
            "data": {
                "badParam": ["badParam is not a valid filter."],
                "badsort": ["badsort is not a valid sort."]
            }
        })
    );

    cleanup_user(&pool, email).await;
}
