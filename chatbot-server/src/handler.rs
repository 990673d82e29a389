use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chatbot::{ChatError, DatasetError, ModelLoadError};
use serde_json::json;
use uuid::Uuid;

pub mod datasets;
pub mod health;
pub mod models;
pub mod page;
pub mod sessions;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    #[error("A response is still being generated for this session")]
    Busy,
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::ModelLoad(ModelLoadError::Backend { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::ModelLoad(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Chat(ChatError::EmptyPrompt) => StatusCode::BAD_REQUEST,
            ApiError::Chat(ChatError::Generation(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Dataset(DatasetError::EmptyIdentifier) => StatusCode::BAD_REQUEST,
            ApiError::Dataset(DatasetError::NotFound(_) | DatasetError::NoTrainSplit(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Dataset(DatasetError::Parse(_) | DatasetError::Backend { .. }) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
