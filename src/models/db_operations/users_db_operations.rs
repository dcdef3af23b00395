use crate::models::UserSession;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult};

/// Stored credentials for one account.
pub struct UserRecord {
    pub user: UserSession,
    pub password_hash: String,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> RusqliteResult<UserSession> {
    Ok(UserSession {
        uid: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        photo_url: row.get(3)?,
    })
}

pub fn create_user(
    conn: &Connection,
    uid: &str,
    email: &str,
    password_hash: &str,
) -> RusqliteResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users (uid, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![uid, email, password_hash, now],
    )?;
    Ok(())
}

pub fn email_exists(conn: &Connection, email: &str) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )
}

pub fn read_user_by_email(conn: &Connection, email: &str) -> RusqliteResult<Option<UserRecord>> {
    conn.query_row(
        "SELECT uid, email, display_name, photo_url, password_hash FROM users WHERE email = ?1",
        [email],
        |row| {
            Ok(UserRecord {
                user: row_to_user(row)?,
                password_hash: row.get(4)?,
            })
        },
    )
    .optional()
}

pub fn read_all_users(conn: &Connection) -> RusqliteResult<Vec<UserSession>> {
    let mut stmt = conn.prepare(
        "SELECT uid, email, display_name, photo_url FROM users ORDER BY created_at, email",
    )?;
    let rows = stmt.query_map([], row_to_user)?;

    let mut users = Vec::new();
    for user in rows {
        users.push(user?);
    }
    Ok(users)
}

pub fn update_last_login_time(conn: &Connection, uid: &str) -> RusqliteResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET last_login_time = ?1 WHERE uid = ?2",
        params![now, uid],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_users_db(&mut conn).unwrap();
        conn
    }

    #[test]
    fn create_and_read_back() {
        let conn = conn();
        create_user(&conn, "u1", "cook@example.com", "hash").unwrap();

        assert!(email_exists(&conn, "cook@example.com").unwrap());
        let record = read_user_by_email(&conn, "cook@example.com").unwrap().unwrap();
        assert_eq!(record.user.uid, "u1");
        assert_eq!(record.password_hash, "hash");
        assert!(record.user.display_name.is_none());
    }

    #[test]
    fn duplicate_email_is_rejected_by_the_schema() {
        let conn = conn();
        create_user(&conn, "u1", "cook@example.com", "hash").unwrap();
        assert!(create_user(&conn, "u2", "cook@example.com", "hash").is_err());
        assert_eq!(read_all_users(&conn).unwrap().len(), 1);
    }

    #[test]
    fn unknown_email_reads_as_none() {
        let conn = conn();
        assert!(read_user_by_email(&conn, "nobody@example.com").unwrap().is_none());
    }
}
