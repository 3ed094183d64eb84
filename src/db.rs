use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

const DB_PATH: &str = "data/fb.sqlite";

/// Canonical post row, one per edge/content-block per response.
/// Counts are absent (not zero) when the wire shape didn't carry them.
#[derive(Debug, Clone, Serialize)]
pub struct PostRecord {
    pub name: String,
    pub page_id: String,
    pub post_id: String,
    /// Formatted `YYYY-MM-DD HH:MM:SS` (UTC).
    pub time: String,
    pub message: String,
    pub attachment_title: String,
    pub attachment_description: String,
    pub attachment_photos: String,
    pub reaction_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub display_comment_count: Option<i64>,
    pub share_count: Option<i64>,
    pub top_reactions: Vec<Value>,
    pub cursor: String,
    pub actor_url: String,
    pub post_url: String,
}

pub struct Stats {
    pub posts: usize,
    pub pages: usize,
    pub latest: Option<String>,
    pub earliest: Option<String>,
}

pub fn connect() -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id                     INTEGER PRIMARY KEY,
            page_id                TEXT NOT NULL,
            post_id                TEXT NOT NULL,
            name                   TEXT NOT NULL,
            time                   TEXT NOT NULL,
            message                TEXT,
            attachment_title       TEXT,
            attachment_description TEXT,
            attachment_photos      TEXT,
            reaction_count         INTEGER,
            comment_count          INTEGER,
            display_comment_count  INTEGER,
            share_count            INTEGER,
            top_reactions          TEXT,
            cursor                 TEXT,
            actor_url              TEXT,
            post_url               TEXT,
            crawled_at             TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(page_id, post_id)
        );
        CREATE INDEX IF NOT EXISTS idx_posts_page_time ON posts(page_id, time);
        ",
    )?;
    Ok(())
}

/// Insert a batch of rows, ignoring ones already crawled. A refetched page
/// (e.g. after a cursor regression) dedups on `(page_id, post_id)`.
/// Returns the number actually inserted.
pub fn save_posts(conn: &Connection, rows: &[PostRecord]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO posts (
            page_id, post_id, name, time, message,
            attachment_title, attachment_description, attachment_photos,
            reaction_count, comment_count, display_comment_count, share_count,
            top_reactions, cursor, actor_url, post_url
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )?;

    let mut inserted = 0;
    for row in rows {
        let top_reactions = serde_json::to_string(&row.top_reactions).unwrap_or_default();
        inserted += stmt.execute(rusqlite::params![
            row.page_id,
            row.post_id,
            row.name,
            row.time,
            row.message,
            row.attachment_title,
            row.attachment_description,
            row.attachment_photos,
            row.reaction_count,
            row.comment_count,
            row.display_comment_count,
            row.share_count,
            top_reactions,
            row.cursor,
            row.actor_url,
            row.post_url,
        ])?;
    }
    Ok(inserted)
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let posts: usize = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
    let pages: usize =
        conn.query_row("SELECT COUNT(DISTINCT page_id) FROM posts", [], |r| r.get(0))?;
    let latest: Option<String> =
        conn.query_row("SELECT MAX(time) FROM posts", [], |r| r.get(0))?;
    let earliest: Option<String> =
        conn.query_row("SELECT MIN(time) FROM posts", [], |r| r.get(0))?;
    Ok(Stats {
        posts,
        pages,
        latest,
        earliest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(page_id: &str, post_id: &str) -> PostRecord {
        PostRecord {
            name: "Example Page".into(),
            page_id: page_id.into(),
            post_id: post_id.into(),
            time: "2020-09-13 12:26:40".into(),
            message: "hello".into(),
            attachment_title: String::new(),
            attachment_description: String::new(),
            attachment_photos: String::new(),
            reaction_count: Some(1),
            comment_count: None,
            display_comment_count: None,
            share_count: None,
            top_reactions: Vec::new(),
            cursor: "c1".into(),
            actor_url: "https://www.facebook.com/example".into(),
            post_url: "https://www.facebook.com/example/posts/1".into(),
        }
    }

    #[test]
    fn insert_is_idempotent_on_id_pair() {
        let conn = memory_conn();
        let rows = vec![record("100", "200"), record("100", "201")];
        assert_eq!(save_posts(&conn, &rows).unwrap(), 2);
        assert_eq!(save_posts(&conn, &rows).unwrap(), 0);
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.posts, 2);
        assert_eq!(stats.pages, 1);
    }

    #[test]
    fn stats_on_empty_table() {
        let conn = memory_conn();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.posts, 0);
        assert!(stats.latest.is_none());
    }
}
