use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::error::BoardError;

pub mod auth;
pub mod comments;
pub mod posts;

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .configure(posts::config)
            .configure(comments::config)
            .configure(auth::config),
    );
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Logs a failed operation before it is turned into an error response.
pub(crate) fn logged(operation: &'static str) -> impl Fn(BoardError) -> BoardError {
    move |e| {
        match e {
            BoardError::Validation(_) | BoardError::NotFound(_) | BoardError::Auth(_) => {
                log::warn!("{} rejected: {}", operation, e)
            }
            _ => log::error!("{} failed: {}", operation, e),
        }
        e
    }
}
