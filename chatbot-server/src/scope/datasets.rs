use actix_web::{Scope, web};

use crate::handler::datasets;

pub fn datasets_scope() -> Scope {
    web::scope("/datasets").route("/preview", web::post().to(datasets::preview_dataset))
}
