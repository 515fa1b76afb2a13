//! HTTP surface of the books module.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};

use biblio_http::error::AppError;

use super::models::{Book, BookFilter, CreateBookRequest};
use super::service::{CatalogError, CatalogService};

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(message) => AppError::validation(message),
            CatalogError::NotFound => AppError::not_found("book not found"),
            CatalogError::InvalidTransition(message) => AppError::bad_request(message),
            CatalogError::Store(err) => AppError::Internal(err.into()),
        }
    }
}

/// Builds the books router over the shared catalog service.
pub fn router(service: Arc<CatalogService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book))
        .route("/{id}/loan", patch(loan_book))
        .route("/{id}/return", patch(return_book))
        .with_state(service)
}

async fn create_book(
    State(service): State<Arc<CatalogService>>,
    Json(request): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn list_books(
    State(service): State<Arc<CatalogService>>,
    Query(filter): Query<BookFilter>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.list(&filter).await?))
}

async fn get_book(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get_by_id(id).await?))
}

async fn loan_book(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.loan(id).await?))
}

async fn return_book(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.return_book(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::clock::FixedClock;
    use crate::modules::books::store::InMemoryBookStore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::json;
    use time::macros::datetime;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = Arc::new(CatalogService::new(
            Arc::new(InMemoryBookStore::default()),
            Arc::new(FixedClock(datetime!(2026-06-15 12:00:00 UTC))),
        ));
        router(service)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn patch_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_book_returns_201_with_available_record() {
        let app = app();

        let response = app
            .oneshot(post_json(
                "/",
                json!({"title": "Dune", "author": "Frank Herbert", "publicationYear": 1965}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Dune");
        assert_eq!(body["publicationYear"], 1965);
        assert_eq!(body["available"], true);
        assert!(body["createdAt"].is_string());
    }

    #[tokio::test]
    async fn create_book_with_missing_fields_returns_400() {
        let app = app();

        let response = app
            .oneshot(post_json("/", json!({"title": "Dune"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({"error": "title, author and publication year are required"})
        );
    }

    #[tokio::test]
    async fn create_book_with_future_year_returns_400() {
        let app = app();

        let response = app
            .oneshot(post_json(
                "/",
                json!({"title": "Dune", "author": "Frank Herbert", "publicationYear": 2027}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({"error": "publication year cannot be in the future"})
        );
    }

    #[tokio::test]
    async fn get_unknown_book_returns_404() {
        let app = app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/9999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "book not found"}));
    }

    #[tokio::test]
    async fn loan_and_return_drive_the_state_machine_over_http() {
        let app = app();

        let created = app
            .clone()
            .oneshot(post_json(
                "/",
                json!({"title": "Dune", "author": "Frank Herbert", "publicationYear": 1965}),
            ))
            .await
            .unwrap();
        let id = body_json(created).await["id"].as_i64().unwrap();

        let loaned = app
            .clone()
            .oneshot(patch_empty(&format!("/{id}/loan")))
            .await
            .unwrap();
        assert_eq!(loaned.status(), StatusCode::OK);
        assert_eq!(body_json(loaned).await["available"], false);

        let double_loan = app
            .clone()
            .oneshot(patch_empty(&format!("/{id}/loan")))
            .await
            .unwrap();
        assert_eq!(double_loan.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(double_loan).await,
            json!({"error": "cannot loan an unavailable book"})
        );

        let returned = app
            .clone()
            .oneshot(patch_empty(&format!("/{id}/return")))
            .await
            .unwrap();
        assert_eq!(returned.status(), StatusCode::OK);
        assert_eq!(body_json(returned).await["available"], true);

        let double_return = app
            .oneshot(patch_empty(&format!("/{id}/return")))
            .await
            .unwrap();
        assert_eq!(double_return.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(double_return).await,
            json!({"error": "book is already available"})
        );
    }

    #[tokio::test]
    async fn list_honors_query_filters() {
        let app = app();

        for (title, author, year) in [
            ("Dune", "Frank Herbert", 1965),
            ("The Hobbit", "J.R.R. Tolkien", 1937),
        ] {
            app.clone()
                .oneshot(post_json(
                    "/",
                    json!({"title": title, "author": author, "publicationYear": year}),
                ))
                .await
                .unwrap();
        }
        app.clone()
            .oneshot(patch_empty("/1/loan"))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/?author=tolk")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["author"], "J.R.R. Tolkien");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/?available=false")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["title"], "Dune");
    }
}
