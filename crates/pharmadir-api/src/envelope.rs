use axum::Json;
use serde::Serialize;

/// Body of every successful `/api` response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

pub(crate) fn ok<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: message.into(),
    })
}
