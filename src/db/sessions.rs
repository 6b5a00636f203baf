use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Session;

pub fn create(conn: &Connection, session: &Session) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, user_id, provider, provider_token, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session.id,
            session.user_id,
            session.provider,
            session.provider_token,
            session.created_at,
            session.expires_at
        ],
    )?;
    Ok(())
}

/// Looks a session up by token regardless of expiry.
pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        "SELECT id, user_id, provider, provider_token, created_at, expires_at
         FROM sessions WHERE id = ?1",
        params![id],
        |row| {
            Ok(Session {
                id: row.get(0)?,
                user_id: row.get(1)?,
                provider: row.get(2)?,
                provider_token: row.get(3)?,
                created_at: row.get(4)?,
                expires_at: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Returns the user id behind a session that has not expired as of `now`.
pub fn active_user_id(conn: &Connection, id: &str, now: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT user_id FROM sessions WHERE id = ?1 AND expires_at > ?2",
        params![id, now],
        |row| row.get(0),
    )
    .optional()
}

/// Attaches federated credentials to an existing session row.
pub fn set_provider(
    conn: &Connection,
    id: &str,
    provider: &str,
    provider_token: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE sessions SET provider = ?2, provider_token = ?3 WHERE id = ?1",
        params![id, provider, provider_token],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn session(id: &str, user_id: &str, expires_at: &str) -> Session {
        Session {
            id: id.into(),
            user_id: user_id.into(),
            provider: None,
            provider_token: None,
            created_at: "2024-01-01 00:00:00.000".into(),
            expires_at: expires_at.into(),
        }
    }

    #[test]
    fn active_user_id_respects_expiry() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let user = testing::user(&conn, "alice");
        create(&conn, &session("tok", &user, "2024-01-01 02:00:00.000")).unwrap();

        let before = active_user_id(&conn, "tok", "2024-01-01 01:00:00.000").unwrap();
        assert_eq!(before.as_deref(), Some(user.as_str()));

        let after = active_user_id(&conn, "tok", "2024-01-01 03:00:00.000").unwrap();
        assert!(after.is_none());

        // The stale row is still there until someone deletes it.
        assert!(get(&conn, "tok").unwrap().is_some());
    }

    #[test]
    fn set_provider_overwrites_credentials() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let user = testing::user(&conn, "alice");
        create(&conn, &session("tok", &user, "2999-01-01 00:00:00.000")).unwrap();

        set_provider(&conn, "tok", "google", "ya29.first").unwrap();
        set_provider(&conn, "tok", "google", "ya29.second").unwrap();

        let stored = get(&conn, "tok").unwrap().unwrap();
        assert_eq!(stored.provider.as_deref(), Some("google"));
        assert_eq!(stored.provider_token.as_deref(), Some("ya29.second"));
        assert_eq!(stored.expires_at, "2999-01-01 00:00:00.000");
    }

    #[test]
    fn delete_removes_row() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let user = testing::user(&conn, "alice");
        create(&conn, &session("tok", &user, "2999-01-01 00:00:00.000")).unwrap();

        delete(&conn, "tok").unwrap();
        assert!(get(&conn, "tok").unwrap().is_none());
        // Deleting a missing row is fine.
        delete(&conn, "tok").unwrap();
    }
}
