use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `Json` with rejections rendered in the API's `{message, code}` shape.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(reject)
    }
}

fn reject(rejection: JsonRejection) -> Response {
    let code = match &rejection {
        JsonRejection::MissingJsonContentType(_) => "unsupported_media_type",
        JsonRejection::JsonDataError(_) => "invalid_body",
        _ => "invalid_json",
    };
    tracing::warn!(code, "Rejected request body: {}", rejection.body_text());

    (
        rejection.status(),
        Json(json!({
            "message": rejection.body_text(),
            "code": code,
        })),
    )
        .into_response()
}
