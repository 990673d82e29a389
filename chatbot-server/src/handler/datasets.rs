use actix_web::{Responder, web};
use chatbot::load_preview;

use crate::{handler::ApiError, startup::DatasetSource};

#[derive(serde::Deserialize, Debug)]
pub struct PreviewDatasetModel {
    dataset: String,
}

/// Loads a preview of a dataset. Sessions and models are never touched, so a
/// broken dataset cannot interfere with the chat.
#[tracing::instrument(skip(datasets))]
pub async fn preview_dataset(
    body: web::Json<PreviewDatasetModel>,
    datasets: web::Data<DatasetSource>,
) -> Result<impl Responder, ApiError> {
    let preview = load_preview(datasets.0.as_ref(), &body.dataset).await?;
    Ok(web::Json(preview))
}
