use actix_web::{Scope, web};

use crate::handler::sessions;

pub fn sessions_scope() -> Scope {
    web::scope("/sessions")
        .route("", web::post().to(sessions::create_session))
        .route("/{id}", web::get().to(sessions::get_session))
        .route("/{id}", web::delete().to(sessions::delete_session))
        .route("/{id}/messages", web::post().to(sessions::submit_message))
        .route("/{id}/messages", web::delete().to(sessions::clear_messages))
}
