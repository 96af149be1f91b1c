//! Request extractors.

use crate::error::AppError;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, rejection::JsonRejection},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// JSON body extractor whose rejections become `AppError::InvalidRequest`.
///
/// `axum::Json` answers 415 or 422 for some malformed bodies; every
/// malformed body here is a 400 with the standard error envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    AppError::InvalidRequest(rejection.body_text())
}

/// Path extractor; a segment that does not parse (e.g. a bad UUID) is a
/// 400 with the standard error envelope.
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| ApiPath(value))
            .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
    }
}

/// Query string extractor with the same rejection mapping as [`ApiPath`].
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header},
        routing::get,
    };
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct Sample {
        amount_cents: i64,
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_is_extracted() {
        let ApiJson(sample) = ApiJson::<Sample>::from_request(json_request(r#"{"amount_cents": 42}"#), &())
            .await
            .unwrap();
        assert_eq!(sample.amount_cents, 42);
    }

    #[tokio::test]
    async fn test_syntax_error_is_invalid_request() {
        let err = ApiJson::<Sample>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_invalid_request() {
        let err = ApiJson::<Sample>::from_request(json_request(r#"{"amount_cents": "lots"}"#), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_invalid_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"amount_cents": 1}"#))
            .unwrap();

        let err = ApiJson::<Sample>::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[derive(Debug, Deserialize)]
    struct Filter {
        #[serde(default)]
        unread_only: bool,
        client_id: Option<Uuid>,
    }

    fn test_router() -> Router {
        Router::new()
            .route(
                "/loans/{id}",
                get(|ApiPath(id): ApiPath<Uuid>| async move { id.to_string() }),
            )
            .route(
                "/items",
                get(|ApiQuery(filter): ApiQuery<Filter>| async move {
                    format!("{} {:?}", filter.unread_only, filter.client_id)
                })
                .post(|ApiJson(sample): ApiJson<Sample>| async move {
                    sample.amount_cents.to_string()
                }),
            )
    }

    async fn send(request: Request) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = test_router().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, content_type, body)
    }

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_path_is_extracted() {
        let response = test_router()
            .oneshot(get_request("/loans/550e8400-e29b-41d4-a716-446655440000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_uuid_path_is_json_invalid_request() {
        let (status, content_type, body) = send(get_request("/loans/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_bad_query_values_are_json_invalid_request() {
        for uri in ["/items?unread_only=maybe", "/items?client_id=bad"] {
            let (status, content_type, body) = send(get_request(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(content_type.as_deref(), Some("application/json"));
            assert_eq!(body["error"]["code"], "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_valid_query_is_extracted() {
        let (status, _, _) = send(get_request("/items?unread_only=true")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_invalid_request_through_router() {
        let (status, content_type, body) = send(json_request_to("/items", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["error"]["code"], "invalid_request");
    }

    fn json_request_to(uri: &str, body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }
}
