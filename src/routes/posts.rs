use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::BoardError;
use crate::helper::form_helpers;
use crate::models::db_operations::posts_db_operations;
use crate::routes::logged;
use crate::view::filter_posts;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    q: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/posts", web::get().to(list_posts))
        .route("/posts", web::post().to(create_post))
        .route("/posts/{id}", web::get().to(get_post))
        .route("/posts/{id}", web::delete().to(delete_post))
        .route("/posts/{id}/like", web::post().to(like_post));
}

async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, BoardError> {
    let posts = posts_db_operations::list_posts(state.documents.as_ref()).map_err(logged("Listing posts"))?;
    let term = query.q.as_deref().unwrap_or_default();
    Ok(HttpResponse::Ok().json(filter_posts(&posts, term)))
}

async fn create_post(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, BoardError> {
    let (fields, image) = form_helpers::read_post_form(payload)
        .await
        .map_err(logged("Creating post"))?;

    // The image upload is file IO.
    let id = web::block(move || {
        posts_db_operations::create_post(
            state.documents.as_ref(),
            state.objects.as_ref(),
            &fields,
            image.as_ref(),
        )
    })
    .await
    .map_err(BoardError::from)
    .and_then(|result| result)
    .map_err(logged("Creating post"))?;

    Ok(HttpResponse::Created().json(json!({ "success": true, "id": id })))
}

async fn get_post(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    let post = posts_db_operations::get_post(state.documents.as_ref(), &id).map_err(logged("Loading post"))?;
    Ok(HttpResponse::Ok().json(post))
}

async fn delete_post(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    let id = id.into_inner();
    web::block(move || {
        posts_db_operations::delete_post(state.documents.as_ref(), state.objects.as_ref(), &id)
    })
    .await
    .map_err(BoardError::from)
    .and_then(|result| result)
    .map_err(logged("Deleting post"))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

async fn like_post(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    let id = id.into_inner();
    let likes = web::block(move || posts_db_operations::like_post(state.documents.as_ref(), &id))
        .await
        .map_err(BoardError::from)
        .and_then(|result| result)
        .map_err(logged("Liking post"))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "likes": likes })))
}
