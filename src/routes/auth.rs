use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::BoardError;
use crate::middleware::AuthenticatedUser;
use crate::routes::logged;
use crate::session::SessionContext;
use crate::AppState;

#[derive(Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/signup", web::post().to(sign_up))
        .route("/auth/login", web::post().to(log_in))
        .route("/auth/logout", web::post().to(log_out))
        .route("/auth/me", web::get().to(me));
}

#[derive(Clone, Copy)]
enum AuthAction {
    SignUp,
    SignIn,
}

/// Runs the password check off the async workers and stores the resulting
/// context in the cookie session.
async fn authenticate(
    state: web::Data<AppState>,
    session: Session,
    credentials: Credentials,
    action: AuthAction,
) -> Result<HttpResponse, actix_web::Error> {
    let operation = match action {
        AuthAction::SignUp => "Sign-up",
        AuthAction::SignIn => "Sign-in",
    };

    let identity = state.identity.clone();
    let context = web::block(move || {
        let mut context = SessionContext::signed_out();
        match action {
            AuthAction::SignUp => context.sign_up(identity.as_ref(), &credentials.email, &credentials.password)?,
            AuthAction::SignIn => context.sign_in(identity.as_ref(), &credentials.email, &credentials.password)?,
        };
        Ok::<_, BoardError>(context)
    })
    .await
    .map_err(BoardError::from)
    .and_then(|result| result)
    .map_err(logged(operation))?;

    context.store(&session)?;
    let mut status = match action {
        AuthAction::SignUp => HttpResponse::Created(),
        AuthAction::SignIn => HttpResponse::Ok(),
    };
    Ok(status.json(json!({ "success": true, "user": context.current() })))
}

async fn sign_up(
    state: web::Data<AppState>,
    session: Session,
    credentials: web::Json<Credentials>,
) -> Result<HttpResponse, actix_web::Error> {
    authenticate(state, session, credentials.into_inner(), AuthAction::SignUp).await
}

async fn log_in(
    state: web::Data<AppState>,
    session: Session,
    credentials: web::Json<Credentials>,
) -> Result<HttpResponse, actix_web::Error> {
    authenticate(state, session, credentials.into_inner(), AuthAction::SignIn).await
}

async fn log_out(mut context: SessionContext, session: Session) -> Result<HttpResponse, actix_web::Error> {
    context.sign_out();
    context.store(&session)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "user": user.0 }))
}
