//! Composable, parameterized predicates for the post filter form.
//!
//! Every user-supplied value is bound as a parameter; the SQL text only ever
//! contains fixed fragments and `?` placeholders.

use chrono::NaiveDate;
use rusqlite::types::Value;

/// Form value meaning "do not filter by category".
pub const ALL_CATEGORIES: &str = "all_categories";

/// Like-count bucket value meaning "ignore the likes filter".
pub const IGNORE_LIKES: i64 = -1;

const LIKE_COUNT: &str =
    "(SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id AND r.reaction_type = 'like')";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    categories: Vec<String>,
    from_date: Option<NaiveDate>,
    like_buckets: Vec<i64>,
}

impl PostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to posts carrying any of `categories`. The sentinel
    /// [`ALL_CATEGORIES`] anywhere in the list disables the predicate.
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories: Vec<String> = categories
            .into_iter()
            .map(Into::into)
            .filter(|c| !c.trim().is_empty())
            .collect();
        self.categories = if categories.iter().any(|c| c == ALL_CATEGORIES) {
            Vec::new()
        } else {
            categories
        };
        self
    }

    pub fn from_date(mut self, date: Option<NaiveDate>) -> Self {
        self.from_date = date;
        self
    }

    /// `0` matches posts with no likes, `N > 0` at least `N` likes, and
    /// [`IGNORE_LIKES`] (or any other negative value) is dropped.
    pub fn like_buckets<I: IntoIterator<Item = i64>>(mut self, buckets: I) -> Self {
        self.like_buckets = buckets.into_iter().filter(|b| *b >= 0).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.from_date.is_none() && self.like_buckets.is_empty()
    }

    /// Renders the predicates as a `WHERE` body over the `posts p` alias,
    /// together with the values to bind in order.
    pub fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["1 = 1".to_string()];
        let mut values = Vec::new();

        if let Some(date) = self.from_date {
            clauses.push("p.created_at >= ?".to_string());
            values.push(Value::Text(date.format("%Y-%m-%d").to_string()));
        }

        if !self.categories.is_empty() {
            let any: Vec<&str> = self
                .categories
                .iter()
                .map(|_| "instr('; ' || p.category || '; ', '; ' || ? || '; ') > 0")
                .collect();
            clauses.push(format!("({})", any.join(" OR ")));
            values.extend(self.categories.iter().cloned().map(Value::Text));
        }

        if !self.like_buckets.is_empty() {
            let mut any = Vec::with_capacity(self.like_buckets.len());
            for bucket in &self.like_buckets {
                if *bucket == 0 {
                    any.push(format!("{LIKE_COUNT} = 0"));
                } else {
                    any.push(format!("{LIKE_COUNT} >= ?"));
                    values.push(Value::Integer(*bucket));
                }
            }
            clauses.push(format!("({})", any.join(" OR ")));
        }

        (clauses.join(" AND "), values)
    }
}
