use std::convert::Infallible;

use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::error::BoardError;
use crate::models::db_operations::comments_db_operations;
use crate::models::Comment;
use crate::routes::logged;
use crate::AppState;

#[derive(Deserialize)]
pub struct NewCommentRequest {
    #[serde(default)]
    author: String,
    #[serde(default)]
    content: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/posts/{id}/comments", web::get().to(list_comments))
        .route("/posts/{id}/comments", web::post().to(add_comment))
        .route("/posts/{id}/comments/stream", web::get().to(stream_comments))
        .route("/comments/{id}", web::delete().to(delete_comment));
}

async fn list_comments(
    state: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    let comments = comments_db_operations::list_comments(state.documents.as_ref(), &post_id)
        .map_err(logged("Listing comments"))?;
    Ok(HttpResponse::Ok().json(comments))
}

async fn add_comment(
    state: web::Data<AppState>,
    post_id: web::Path<String>,
    body: web::Json<NewCommentRequest>,
) -> Result<HttpResponse, BoardError> {
    let post_id = post_id.into_inner();
    let body = body.into_inner();
    let id = web::block(move || {
        comments_db_operations::add_comment(state.documents.as_ref(), &post_id, &body.author, &body.content)
    })
    .await
    .map_err(BoardError::from)
    .and_then(|result| result)
    .map_err(logged("Adding comment"))?;

    Ok(HttpResponse::Created().json(json!({ "success": true, "id": id })))
}

fn sse_event(snapshot: Result<Vec<Comment>, BoardError>) -> Bytes {
    let (event, data) = match snapshot {
        Ok(comments) => match serde_json::to_string(&comments) {
            Ok(data) => ("comments", data),
            Err(e) => {
                log::error!("Could not encode comment snapshot: {}", e);
                ("error", json!({ "success": false, "error": "Could not load the comments." }).to_string())
            }
        },
        Err(e) => {
            log::error!("Comment stream failed: {}", e);
            ("error", json!({ "success": false, "error": e.user_message() }).to_string())
        }
    };
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

/// Server-Sent Events stream of the full comment list. The subscription is
/// released when the client disconnects and the body stream is dropped.
async fn stream_comments(
    state: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    let subscription = comments_db_operations::watch_comments(state.documents.as_ref(), &post_id)
        .map_err(logged("Subscribing to comments"))?;
    log::debug!("Comment stream opened for post {}", post_id);

    let events = subscription.map(|snapshot| Ok::<_, Infallible>(sse_event(snapshot)));
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}

async fn delete_comment(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    let id = id.into_inner();
    web::block(move || comments_db_operations::delete_comment(state.documents.as_ref(), &id))
        .await
        .map_err(BoardError::from)
        .and_then(|result| result)
        .map_err(logged("Deleting comment"))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
