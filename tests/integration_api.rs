//! API integration tests
//!
//! These drive the real router against a live Postgres instance and are
//! ignored by default; run them with `cargo test -- --ignored` after
//! setting DATABASE_URL.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    middleware, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::util::ServiceExt;
use uuid::Uuid;

use biblioteka::api;
use biblioteka::jobs::find_overdue;

mod common;

fn build_app(pool: PgPool) -> Router {
    api::create_router()
        .layer(middleware::from_fn_with_state(
            pool.clone(),
            api::middleware::auth_middleware,
        ))
        .with_state(pool)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_rental_lifecycle_e2e() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    // Patron checks out the book for themselves
    let body = json!({"book": fx.book_id, "reader": fx.patron_id});
    let response = app
        .clone()
        .oneshot(request("POST", "/rent", Some(common::PATRON_TOKEN), Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "checkout failed");
    let rental = json_body(response).await;
    let rental_id = rental["pk"].as_str().unwrap().to_string();
    assert_eq!(rental["is_returned"], false);

    // Deadline is fixed at creation: rental_date plus the 30-day loan period
    let rental_date: chrono::DateTime<chrono::Utc> =
        rental["rental_date"].as_str().unwrap().parse().unwrap();
    let deadline: chrono::DateTime<chrono::Utc> =
        rental["deadline"].as_str().unwrap().parse().unwrap();
    assert_eq!(deadline - rental_date, chrono::Duration::days(30));

    // Book is now flagged unavailable
    let response = app
        .clone()
        .oneshot(request("GET", &format!("/books/{}", fx.book_id), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["is_available"], false);

    // Second checkout of the same book conflicts
    let body2 = json!({"book": fx.book_id, "reader": fx.other_patron_id});
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::OTHER_PATRON_TOKEN),
            Some(body2),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = json_body(response).await;
    assert_eq!(error["error_code"], "book_unavailable");

    // Patrons may not record returns
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/rent/{}", rental_id),
            Some(common::PATRON_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Librarian records the return
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/rent/{}", rental_id),
            Some(common::LIBRARIAN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let returned = json_body(response).await;
    assert_eq!(returned["is_returned"], true);
    assert!(!returned["return_date"].is_null());

    // Book is available again
    let response = app
        .clone()
        .oneshot(request("GET", &format!("/books/{}", fx.book_id), None, None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["is_available"], true);

    // Returning twice is a conflict, not a silent no-op
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/rent/{}", rental_id),
            Some(common::LIBRARIAN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error_code"], "rental_already_closed");

    // Closed rental now reads as "closed"
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/rent/{}", rental_id),
            Some(common::PATRON_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = json_body(response).await;
    assert_eq!(view["status"], "closed");
    assert!(view.get("is_returned").is_none());
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_concurrent_checkout_single_winner() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    let first = app.clone().oneshot(request(
        "POST",
        "/rent",
        Some(common::PATRON_TOKEN),
        Some(json!({"book": fx.book_id, "reader": fx.patron_id})),
    ));
    let second = app.clone().oneshot(request(
        "POST",
        "/rent",
        Some(common::OTHER_PATRON_TOKEN),
        Some(json!({"book": fx.book_id, "reader": fx.other_patron_id})),
    ));

    let (first, second) = tokio::join!(first, second);
    let statuses = [first.unwrap().status(), second.unwrap().status()];

    assert!(statuses.contains(&StatusCode::CREATED), "no winner: {:?}", statuses);
    assert!(statuses.contains(&StatusCode::CONFLICT), "no loser: {:?}", statuses);

    let rental_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals")
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(rental_count, 1);
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_list_scoping_and_read_masking() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    // Second book so both patrons can have a rental
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/books",
            Some(common::LIBRARIAN_TOKEN),
            Some(json!({"title": "Foundation"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let second_book = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::PATRON_TOKEN),
            Some(json!({"book": fx.book_id, "reader": fx.patron_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let patron_rental = json_body(response).await["pk"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::OTHER_PATRON_TOKEN),
            Some(json!({"book": second_book, "reader": fx.other_patron_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Librarian sees everything
    let response = app
        .clone()
        .oneshot(request("GET", "/rent", Some(common::LIBRARIAN_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["total"], 2);

    // Patron sees only their own records
    let response = app
        .clone()
        .oneshot(request("GET", "/rent", Some(common::PATRON_TOKEN), None))
        .await
        .unwrap();
    let page = json_body(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["rentals"][0]["reader"], fx.patron_id.to_string());

    // A foreign rental reads as not-found, not forbidden
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/rent/{}", patron_rental),
            Some(common::OTHER_PATRON_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Anonymous callers are refused outright
    let response = app
        .clone()
        .oneshot(request("GET", "/rent", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // A patron cannot check out on someone else's behalf
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::PATRON_TOKEN),
            Some(json!({"book": second_book, "reader": fx.other_patron_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_delete_rental_frees_book() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::PATRON_TOKEN),
            Some(json!({"book": fx.book_id, "reader": fx.patron_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let rental_id = json_body(response).await["pk"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/rent/{}", rental_id),
            Some(common::ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let is_available: bool =
        sqlx::query_scalar("SELECT is_available FROM books WHERE id = $1")
            .bind(fx.book_id)
            .fetch_one(&fx.pool)
            .await
            .unwrap();
    assert!(is_available);

    // The record is gone, not just closed
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/rent/{}", rental_id),
            Some(common::ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_delete_closed_rental_leaves_availability_alone() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    // First loan, returned
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::PATRON_TOKEN),
            Some(json!({"book": fx.book_id, "reader": fx.patron_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let closed_rental = json_body(response).await["pk"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/rent/{}", closed_rental),
            Some(common::LIBRARIAN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same book goes out again under a new rental
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/rent",
            Some(common::OTHER_PATRON_TOKEN),
            Some(json!({"book": fx.book_id, "reader": fx.other_patron_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Deleting the closed historical record must not free the book
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/rent/{}", closed_rental),
            Some(common::ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let is_available: bool =
        sqlx::query_scalar("SELECT is_available FROM books WHERE id = $1")
            .bind(fx.book_id)
            .fetch_one(&fx.pool)
            .await
            .unwrap();
    assert!(!is_available, "delete of a closed rental freed a checked-out book");

    // The open rental is untouched
    let rental_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals")
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(rental_count, 1);
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_unknown_token_rejected() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    let response = app
        .clone()
        .oneshot(request("GET", "/rent", Some("no_such_token"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error_code"], "invalid_token");
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_overdue_scan_and_view() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    // Backdate a rental past its deadline
    let rental_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO rentals (id, book_id, reader_id, rental_date, deadline, return_date, is_returned)
        VALUES ($1, $2, $3, NOW() - INTERVAL '40 days', NOW() - INTERVAL '10 days', NULL, false)
        "#,
    )
    .bind(rental_id)
    .bind(fx.book_id)
    .bind(fx.patron_id)
    .execute(&fx.pool)
    .await
    .unwrap();
    sqlx::query("UPDATE books SET is_available = false WHERE id = $1")
        .bind(fx.book_id)
        .execute(&fx.pool)
        .await
        .unwrap();

    let overdue = find_overdue(&fx.pool).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].rental_id, rental_id);
    assert_eq!(overdue[0].reader_email, "patron@example.com");
    assert_eq!(overdue[0].book_title, "Dune");

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/rent/{}", rental_id),
            Some(common::PATRON_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "overdue");
}

#[tokio::test]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn test_genre_delete_nulls_book_reference() {
    let fx = common::setup_test_db().await;
    let app = build_app(fx.pool.clone());

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/genres/{}", fx.genre_id),
            Some(common::ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let genre_id: Option<Uuid> =
        sqlx::query_scalar("SELECT genre_id FROM books WHERE id = $1")
            .bind(fx.book_id)
            .fetch_one(&fx.pool)
            .await
            .unwrap();
    assert!(genre_id.is_none());
}
