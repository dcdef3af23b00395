use bcrypt::{hash, verify, BcryptError};
use email_address::EmailAddress;
use uuid::Uuid;

use super::{AuthError, BackendError, IdentityProvider};
use crate::models::db_operations::users_db_operations;
use crate::models::UserSession;
use crate::DbPool;

pub const MIN_PASSWORD_LENGTH: usize = 6;

fn bcrypt_to_backend_error(e: BcryptError) -> BackendError {
    BackendError::Unavailable(format!("password hashing failed: {}", e))
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if EmailAddress::is_valid(&email) {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

/// Email/password accounts stored in the SQLite users database.
pub struct SqliteIdentityProvider {
    pool: DbPool,
    hash_cost: u32,
}

impl SqliteIdentityProvider {
    pub fn new(pool: DbPool) -> Self {
        Self::with_cost(pool, bcrypt::DEFAULT_COST)
    }

    /// Same as `new` with an explicit bcrypt cost.
    pub fn with_cost(pool: DbPool, hash_cost: u32) -> Self {
        Self { pool, hash_cost }
    }
}

impl IdentityProvider for SqliteIdentityProvider {
    fn sign_up(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        let conn = self.pool.get().map_err(BackendError::from)?;
        if users_db_operations::email_exists(&conn, &email).map_err(BackendError::from)? {
            return Err(AuthError::EmailAlreadyInUse);
        }

        let password_hash = hash(password, self.hash_cost).map_err(bcrypt_to_backend_error)?;
        let uid = Uuid::new_v4().to_string();
        users_db_operations::create_user(&conn, &uid, &email, &password_hash).map_err(|e| {
            // Lost a race with a concurrent sign-up for the same address.
            match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    AuthError::EmailAlreadyInUse
                }
                other => AuthError::Backend(other.into()),
            }
        })?;

        log::info!("Registered new account {}", uid);
        Ok(UserSession {
            uid,
            email,
            display_name: None,
            photo_url: None,
        })
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        let email = normalize_email(email)?;

        let conn = self.pool.get().map_err(BackendError::from)?;
        let record = users_db_operations::read_user_by_email(&conn, &email)
            .map_err(BackendError::from)?
            .ok_or(AuthError::UserNotFound)?;

        if !verify(password, &record.password_hash).map_err(bcrypt_to_backend_error)? {
            return Err(AuthError::WrongPassword);
        }

        if let Err(e) = users_db_operations::update_last_login_time(&conn, &record.user.uid) {
            log::warn!("Could not record login time for {}: {}", record.user.uid, e);
        }
        Ok(record.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn provider() -> SqliteIdentityProvider {
        // One connection: every in-memory SQLite connection is its own database.
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .unwrap();
        {
            let mut conn = pool.get().unwrap();
            db_setup::setup_users_db(&mut conn).unwrap();
        }
        SqliteIdentityProvider::with_cost(pool, 4)
    }

    #[test]
    fn sign_up_then_sign_in() {
        let identity = provider();
        let created = identity.sign_up("Cook@Example.com ", "secret1").unwrap();
        assert_eq!(created.email, "cook@example.com");

        let session = identity.sign_in("cook@example.com", "secret1").unwrap();
        assert_eq!(session.uid, created.uid);
    }

    #[test]
    fn typed_failures() {
        let identity = provider();
        assert!(matches!(identity.sign_up("not-an-email", "secret1"), Err(AuthError::InvalidEmail)));
        assert!(matches!(identity.sign_up("a@example.com", "12345"), Err(AuthError::WeakPassword)));

        identity.sign_up("a@example.com", "123456").unwrap();
        assert!(matches!(
            identity.sign_up("a@example.com", "another"),
            Err(AuthError::EmailAlreadyInUse)
        ));
        assert!(matches!(identity.sign_in("b@example.com", "123456"), Err(AuthError::UserNotFound)));
        assert!(matches!(identity.sign_in("a@example.com", "654321"), Err(AuthError::WrongPassword)));
    }
}
