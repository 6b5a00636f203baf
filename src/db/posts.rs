use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::filter::PostFilter;
use crate::db::models::{NewPost, Post};
use crate::db::FOLD_CASE_FN;

/// Search results are capped at one page.
pub const SEARCH_PAGE_SIZE: i64 = 15;

const POST_SELECT: &str = "SELECT p.id, p.user_id, u.name, p.title, p.content, p.image_path, \
     p.category, p.created_at FROM posts p JOIN users u ON u.id = p.user_id";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        image_path: row.get(5)?,
        category: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn create(conn: &Connection, post: &NewPost) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO posts (id, user_id, title, content, image_path, category, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            post.id,
            post.user_id,
            post.title,
            post.content,
            post.image_path,
            post.category,
            crate::db::now()
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Global feed, newest first.
pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!("{POST_SELECT} ORDER BY p.created_at DESC"))?;
    let posts = stmt.query_map([], from_row)?.collect();
    posts
}

pub fn list_by_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} WHERE p.user_id = ?1 ORDER BY p.created_at DESC"
    ))?;
    let posts = stmt.query_map(params![user_id], from_row)?.collect();
    posts
}

/// Case-insensitive substring match over title, content and category.
/// Both sides are lowercased with Unicode rules before `LIKE` runs.
pub fn search(conn: &Connection, key: &str) -> rusqlite::Result<Vec<Post>> {
    let pattern = format!("%{}%", escape_like(&key.to_lowercase()));
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT}
         WHERE {FOLD_CASE_FN}(p.title) LIKE ?1 ESCAPE '\\'
            OR {FOLD_CASE_FN}(p.content) LIKE ?1 ESCAPE '\\'
            OR {FOLD_CASE_FN}(p.category) LIKE ?1 ESCAPE '\\'
         ORDER BY p.created_at DESC
         LIMIT ?2"
    ))?;
    let posts = stmt
        .query_map(params![pattern, SEARCH_PAGE_SIZE], from_row)?
        .collect();
    posts
}

/// Posts matching every predicate of `filter`, newest first.
pub fn list_filtered(conn: &Connection, filter: &PostFilter) -> rusqlite::Result<Vec<Post>> {
    let (clause, values) = filter.where_clause();
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} WHERE {clause} ORDER BY p.created_at DESC"
    ))?;
    let posts = stmt
        .query_map(params_from_iter(values.iter()), from_row)?
        .collect();
    posts
}

/// Posts the user has liked or disliked at least once.
pub fn list_reacted_by_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT}
         WHERE p.id IN (SELECT post_id FROM post_reactions WHERE user_id = ?1)
         ORDER BY p.created_at DESC"
    ))?;
    let posts = stmt.query_map(params![user_id], from_row)?.collect();
    posts
}

fn escape_like(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
