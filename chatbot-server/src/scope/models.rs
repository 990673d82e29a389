use actix_web::{Scope, web};

use crate::handler::models;

pub fn models_scope() -> Scope {
    web::scope("/models")
        .route("", web::get().to(models::list_models))
        .route("/load", web::post().to(models::load_model))
}
