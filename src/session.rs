use actix_session::Session;

use crate::backend::IdentityProvider;
use crate::error::BoardError;
use crate::models::UserSession;

/// Cookie-session key holding the signed-in user.
pub const SESSION_USER_KEY: &str = "user";

/// The signed-in user, if any. Passed explicitly to whatever needs it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    user: Option<UserSession>,
}

impl SessionContext {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Replaces the current user with one the identity provider vouched for.
    pub fn establish(&mut self, user: UserSession) -> &UserSession {
        log::info!("Session established for {}", user.uid);
        self.user.insert(user)
    }

    pub fn sign_in(
        &mut self,
        identity: &dyn IdentityProvider,
        email: &str,
        password: &str,
    ) -> Result<&UserSession, BoardError> {
        let user = identity.sign_in(email, password)?;
        Ok(self.establish(user))
    }

    pub fn sign_up(
        &mut self,
        identity: &dyn IdentityProvider,
        email: &str,
        password: &str,
    ) -> Result<&UserSession, BoardError> {
        let user = identity.sign_up(email, password)?;
        Ok(self.establish(user))
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("Session closed for {}", user.uid);
        }
    }

    /// Reads the context from a cookie session. An unreadable entry counts as
    /// signed out.
    pub fn load(session: &Session) -> Self {
        match session.get::<UserSession>(SESSION_USER_KEY) {
            Ok(user) => Self { user },
            Err(e) => {
                log::warn!("Discarding unreadable session entry: {}", e);
                Self::signed_out()
            }
        }
    }

    /// Writes the context back. Signing in renews the session id; signing
    /// out purges the whole session.
    pub fn store(&self, session: &Session) -> Result<(), actix_web::Error> {
        match &self.user {
            Some(user) => {
                session.renew();
                session.insert(SESSION_USER_KEY, user)?;
            }
            None => session.purge(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::identity::SqliteIdentityProvider;
    use crate::backend::AuthError;
    use crate::setup::db_setup::setup_users_db;
    use r2d2_sqlite::SqliteConnectionManager;

    fn provider() -> SqliteIdentityProvider {
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .unwrap();
        setup_users_db(&mut pool.get().unwrap()).unwrap();
        SqliteIdentityProvider::with_cost(pool, 4)
    }

    #[test]
    fn sign_up_sign_out_sign_in() {
        let identity = provider();
        let mut ctx = SessionContext::signed_out();
        assert!(ctx.current().is_none());

        let uid = ctx.sign_up(&identity, "nok@example.com", "secret1").unwrap().uid.clone();
        assert!(ctx.is_signed_in());

        ctx.sign_out();
        assert!(!ctx.is_signed_in());

        let user = ctx.sign_in(&identity, "nok@example.com", "secret1").unwrap();
        assert_eq!(user.uid, uid);
    }

    #[test]
    fn failed_sign_in_leaves_context_unchanged() {
        let identity = provider();
        let mut ctx = SessionContext::signed_out();
        ctx.sign_up(&identity, "nok@example.com", "secret1").unwrap();
        let before = ctx.clone();

        let err = ctx.sign_in(&identity, "nok@example.com", "wrong-password").unwrap_err();
        assert!(matches!(err, BoardError::Auth(AuthError::WrongPassword)));
        assert_eq!(ctx, before);
    }
}
