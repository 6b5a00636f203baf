use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::db::models::{ReactionCounts, ReactionKind};
use crate::db::{placeholders, IN_CHUNK};

/// Records one reaction event. Nothing stops the same user from reacting to
/// the same post repeatedly; every call adds a row.
pub fn add_post_reaction(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
    kind: ReactionKind,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO post_reactions (id, user_id, post_id, reaction_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, post_id, kind.as_str(), crate::db::now()],
    )?;
    Ok(id)
}

pub fn add_comment_reaction(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
    comment_id: &str,
    kind: ReactionKind,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comment_reactions (id, user_id, post_id, comment_id, reaction_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, user_id, post_id, comment_id, kind.as_str(), crate::db::now()],
    )?;
    Ok(id)
}

/// Like/dislike totals for many posts.
pub fn post_counts(
    conn: &Connection,
    post_ids: &[&str],
) -> rusqlite::Result<HashMap<String, ReactionCounts>> {
    grouped_counts(conn, "post_reactions", "post_id", post_ids, None)
}

/// Like/dislike totals for many comments.
pub fn comment_counts(
    conn: &Connection,
    comment_ids: &[&str],
) -> rusqlite::Result<HashMap<String, ReactionCounts>> {
    grouped_counts(conn, "comment_reactions", "comment_id", comment_ids, None)
}

/// Totals of the reactions `user_id` left on each of `post_ids`.
pub fn post_counts_by_user(
    conn: &Connection,
    user_id: &str,
    post_ids: &[&str],
) -> rusqlite::Result<HashMap<String, ReactionCounts>> {
    grouped_counts(conn, "post_reactions", "post_id", post_ids, Some(user_id))
}

/// Totals of the reactions `user_id` left on each of `comment_ids`.
pub fn comment_counts_by_user(
    conn: &Connection,
    user_id: &str,
    comment_ids: &[&str],
) -> rusqlite::Result<HashMap<String, ReactionCounts>> {
    grouped_counts(conn, "comment_reactions", "comment_id", comment_ids, Some(user_id))
}

// `table` and `column` are always crate constants, never request input.
fn grouped_counts(
    conn: &Connection,
    table: &str,
    column: &str,
    ids: &[&str],
    user_id: Option<&str>,
) -> rusqlite::Result<HashMap<String, ReactionCounts>> {
    let mut counts: HashMap<String, ReactionCounts> = HashMap::new();
    let user_clause = if user_id.is_some() { " AND user_id = ?" } else { "" };

    for chunk in ids.chunks(IN_CHUNK) {
        let mut values: Vec<Value> = chunk.iter().map(|id| Value::Text(id.to_string())).collect();
        if let Some(user_id) = user_id {
            values.push(Value::Text(user_id.to_string()));
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {column}, reaction_type, COUNT(*) FROM {table}
             WHERE {column} IN ({}){user_clause}
             GROUP BY {column}, reaction_type",
            placeholders(chunk.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let n: i64 = row.get(2)?;
            if let Ok(kind) = kind.parse::<ReactionKind>() {
                counts.entry(id).or_default().add(kind, n);
            }
        }
    }
    Ok(counts)
}
