use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::{Comment, NewComment};
use crate::db::{placeholders, IN_CHUNK};

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, p.title, c.user_id, u.name, c.content, \
     c.created_at FROM comments c \
     JOIN users u ON u.id = c.user_id \
     JOIN posts p ON p.id = c.post_id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        post_title: row.get(2)?,
        user_id: row.get(3)?,
        author_name: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn create(conn: &Connection, comment: &NewComment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            comment.id,
            comment.post_id,
            comment.user_id,
            comment.content,
            crate::db::now()
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    conn.query_row(
        &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

pub fn list_by_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.created_at DESC"
    ))?;
    let comments = stmt.query_map(params![post_id], from_row)?.collect();
    comments
}

pub fn list_by_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.user_id = ?1 ORDER BY c.created_at DESC"
    ))?;
    let comments = stmt.query_map(params![user_id], from_row)?.collect();
    comments
}

/// Comments the user has liked or disliked at least once.
pub fn list_reacted_by_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT}
         WHERE c.id IN (SELECT comment_id FROM comment_reactions WHERE user_id = ?1)
         ORDER BY c.created_at DESC"
    ))?;
    let comments = stmt.query_map(params![user_id], from_row)?.collect();
    comments
}

/// Comment totals for many posts, one `GROUP BY` query per [`IN_CHUNK`] ids.
/// Posts without comments are absent from the map.
pub fn counts_by_post(conn: &Connection, post_ids: &[&str]) -> rusqlite::Result<HashMap<String, i64>> {
    let mut counts = HashMap::new();
    for chunk in post_ids.chunks(IN_CHUNK) {
        let mut stmt = conn.prepare(&format!(
            "SELECT post_id, COUNT(*) FROM comments WHERE post_id IN ({}) GROUP BY post_id",
            placeholders(chunk.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (post_id, n) = row?;
            counts.insert(post_id, n);
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn comment(conn: &Connection, post_id: &str, user_id: &str, content: &str) -> String {
        let id = uuid::Uuid::now_v7().to_string();
        create(
            conn,
            &NewComment {
                id: id.clone(),
                post_id: post_id.into(),
                user_id: user_id.into(),
                content: content.into(),
            },
        )
        .unwrap();
        id
    }

    #[test]
    fn comments_carry_author_and_post_title() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let bob = testing::user(&conn, "bob");
        let post = testing::post(&conn, &alice, "Hello", "misc");
        let id = comment(&conn, &post, &bob, "nice");

        let c = get(&conn, &id).unwrap().unwrap();
        assert_eq!(c.author_name, "bob");
        assert_eq!(c.post_title, "Hello");

        assert_eq!(list_by_post(&conn, &post).unwrap().len(), 1);
        assert_eq!(list_by_user(&conn, &bob).unwrap().len(), 1);
        assert!(list_by_user(&conn, &alice).unwrap().is_empty());
    }

    #[test]
    fn comment_on_missing_post_is_rejected() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let result = create(
            &conn,
            &NewComment {
                id: "c".into(),
                post_id: "missing".into(),
                user_id: alice,
                content: "hi".into(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn count_for_post_without_comments_is_zero() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let post = testing::post(&conn, &alice, "Hello", "misc");
        let counts = counts_by_post(&conn, &[post.as_str(), "missing"]).unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn batched_counts_group_by_post() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let a = testing::post(&conn, &alice, "a", "misc");
        let b = testing::post(&conn, &alice, "b", "misc");
        let quiet = testing::post(&conn, &alice, "quiet", "misc");
        comment(&conn, &a, &alice, "1");
        comment(&conn, &a, &alice, "2");
        comment(&conn, &b, &alice, "3");

        let counts = counts_by_post(&conn, &[a.as_str(), b.as_str(), quiet.as_str()]).unwrap();
        assert_eq!(counts.get(&a), Some(&2));
        assert_eq!(counts.get(&b), Some(&1));
        assert_eq!(counts.get(&quiet), None);

        assert!(counts_by_post(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn batched_counts_span_many_ids() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let first = testing::post(&conn, &alice, "first", "misc");
        let last = testing::post(&conn, &alice, "last", "misc");
        comment(&conn, &first, &alice, "1");
        comment(&conn, &last, &alice, "2");

        let filler: Vec<String> = (0..2 * IN_CHUNK).map(|i| format!("none-{i}")).collect();
        let mut ids = vec![first.as_str()];
        ids.extend(filler.iter().map(String::as_str));
        ids.push(last.as_str());

        let counts = counts_by_post(&conn, &ids).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&last), Some(&1));
    }
}
