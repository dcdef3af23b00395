use actix_session::SessionExt;
use actix_web::error::InternalError;
use actix_web::{dev, FromRequest, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::future::{ready, Ready};

use crate::models::UserSession;
use crate::session::SessionContext;

/// Extractor for handlers that need a signed-in user. Rejects the request
/// with 401 when the session holds no user.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser(pub UserSession);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let context = SessionContext::load(&req.get_session());
        match context.current() {
            Some(user) => ready(Ok(AuthenticatedUser(user.clone()))),
            None => {
                let response = HttpResponse::Unauthorized()
                    .json(json!({ "success": false, "error": "Not signed in." }));
                ready(Err(InternalError::from_response("not signed in", response).into()))
            }
        }
    }
}

/// Extractor yielding the session context, signed in or not.
impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(SessionContext::load(&req.get_session())))
    }
}
