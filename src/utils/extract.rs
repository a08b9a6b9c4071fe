// src/utils/extract.rs

//! Drop-in replacements for axum's `Json`, `Path` and `Query` extractors whose
//! rejections go through `AppError`, so malformed input gets the same
//! `{success: false, message}` body as every other failure.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// JSON request body.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path parameters.
pub struct AppPath<T>(pub T);

impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Query string.
pub struct AppQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{self, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        count: u32,
    }

    #[tokio::test]
    async fn bad_json_becomes_bad_request() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"count":"many"}"#))
            .unwrap();

        let err = match AppJson::<Payload>::from_request(req, &()).await {
            Ok(_) => panic!("expected a rejection"),
            Err(e) => e,
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_content_type_becomes_bad_request() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"count":1}"#))
            .unwrap();

        let err = match AppJson::<Payload>::from_request(req, &()).await {
            Ok(_) => panic!("expected a rejection"),
            Err(e) => e,
        };
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn bad_query_becomes_bad_request() {
        let (mut parts, _) = http::Request::builder()
            .uri("/?count=-1")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = match AppQuery::<Payload>::from_request_parts(&mut parts, &()).await {
            Ok(_) => panic!("expected a rejection"),
            Err(e) => e,
        };
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
