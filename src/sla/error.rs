use axum::{response::IntoResponse, Json};

#[derive(Debug, thiserror::Error)]
pub enum SlaError {
    #[error("Ticket already has an open pause")]
    AlreadyPaused,
    #[error("Ticket has no open pause")]
    NoOpenPause,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for SlaError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("Record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl IntoResponse for SlaError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::AlreadyPaused | Self::NoOpenPause => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
