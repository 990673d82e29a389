use actix_web::{Responder, web};
use chatbot::{AVAILABLE_MODELS, ModelCache, ModelLoadError, ModelSelection};
use serde::Serialize;

use crate::{config::ModelConfig, handler::ApiError};

#[derive(Serialize)]
pub struct ModelsView {
    models: Vec<&'static str>,
    default: ModelSelection,
    loaded: Vec<ModelSelection>,
}

pub async fn list_models(
    config: web::Data<ModelConfig>,
    models: web::Data<ModelCache>,
) -> impl Responder {
    web::Json(ModelsView {
        models: AVAILABLE_MODELS.to_vec(),
        default: config.default_model.clone(),
        loaded: models.loaded(),
    })
}

#[derive(serde::Deserialize, Debug)]
pub struct LoadModelModel {
    model: ModelSelection,
}

#[derive(Serialize)]
pub struct LoadedModelView {
    model: ModelSelection,
}

/// Acquires a model ahead of the first message so the page can report load
/// failures as soon as a model is picked.
#[tracing::instrument(skip(models))]
pub async fn load_model(
    body: web::Json<LoadModelModel>,
    models: web::Data<ModelCache>,
) -> Result<impl Responder, ApiError> {
    let selection = selectable(&body.model)?;
    models.acquire(selection).await?;
    Ok(web::Json(LoadedModelView {
        model: selection.clone(),
    }))
}

pub(crate) fn selectable(selection: &ModelSelection) -> Result<&ModelSelection, ModelLoadError> {
    if selection.is_listed() {
        Ok(selection)
    } else {
        Err(ModelLoadError::NotSelectable(selection.to_string()))
    }
}
