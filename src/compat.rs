use std::{convert::Infallible, error::Error};

use axum::{
    async_trait,
    extract::{rejection::QueryRejection, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use crate::{content::FetchContext, model};

pub const PREVIEW_COOKIE: &str = "spacetraveling_preview";

/// Query string extractor that rejects with [`model::ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(model::ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<QueryRejection> for model::ApiError {
    fn from(value: QueryRejection) -> Self {
        let mut s = format!("{}", value);

        let mut source_ = value.source();
        while let Some(source) = source_ {
            s.push_str(&format!(": {}", source));
            source_ = source.source();
        }

        model::ApiError::InvalidQuery(s)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for FetchContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(match jar.get(PREVIEW_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => FetchContext::preview(cookie.value()),
            _ => FetchContext::published(),
        })
    }
}

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\" />\
<title>404 | spacetraveling.</title></head><body><h1>404</h1><p>Post não encontrado.</p>\
<a href=\"/\">Voltar</a></body></html>";

const ERROR_PAGE: &str = "<!DOCTYPE html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\" />\
<title>Erro | spacetraveling.</title></head><body><h1>Algo deu errado</h1>\
<a href=\"/\">Voltar</a></body></html>";

fn message(message: &str) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "message": message }))
}

impl IntoResponse for model::ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            model::ApiError::NotFound(path) => {
                tracing::debug!(%path, "not found");
                (StatusCode::NOT_FOUND, axum::response::Html(NOT_FOUND_PAGE)).into_response()
            }

            model::ApiError::InvalidPreviewToken => {
                (StatusCode::UNAUTHORIZED, message("Invalid token")).into_response()
            }

            model::ApiError::InvalidCursor(err) => {
                tracing::warn!(%err, "rejected cursor");
                (StatusCode::BAD_REQUEST, message(&err.to_string())).into_response()
            }

            model::ApiError::InvalidQuery(err) => {
                (StatusCode::BAD_REQUEST, message(&err)).into_response()
            }

            model::ApiError::Content(err) => {
                tracing::error!(error = %err, "content API failure");
                (StatusCode::BAD_GATEWAY, axum::response::Html(ERROR_PAGE)).into_response()
            }

            model::ApiError::Document(err) => {
                tracing::error!(error = %err, "unusable document");
                (StatusCode::BAD_GATEWAY, axum::response::Html(ERROR_PAGE)).into_response()
            }

            model::ApiError::Render(err) => {
                tracing::error!(error = %err, "template failure");
                (StatusCode::INTERNAL_SERVER_ERROR, axum::response::Html(ERROR_PAGE))
                    .into_response()
            }
        }
    }
}
