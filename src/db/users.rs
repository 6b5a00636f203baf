use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{NewUser, User};

const USER_COLUMNS: &str = "id, name, email, hashed_password, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        hashed_password: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn create(conn: &Connection, user: &NewUser) -> rusqlite::Result<()> {
    let now = crate::db::now();
    conn.execute(
        "INSERT INTO users (id, name, email, hashed_password, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![user.id, user.name, user.email, user.hashed_password, now],
    )?;
    Ok(())
}

pub fn get_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Exact, case-sensitive email match.
pub fn get_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 LIMIT 1"),
        params![email],
        from_row,
    )
    .optional()
}

pub fn name_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )
}
