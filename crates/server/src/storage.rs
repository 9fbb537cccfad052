use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

/// Fields for a new session row. One row per login; rows are never updated.
pub struct NewSession<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub provider: &'a str,
    pub access_token: &'a str,
    pub refresh_token: Option<&'a str>,
    pub scope: &'a str,
    pub expires_at: Option<&'a str>,
    pub created_at: &'a str,
}

/// Session joined with its user, as seen by the resolver. Deliberately
/// excludes the access and refresh tokens.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub session_id: String,
    pub provider: String,
    pub user_id: String,
    pub username: String,
    pub title: Option<String>,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert a user, or refresh username/title if the id already exists.
    /// `id` and `created_at` are immutable after first insert.
    pub fn upsert_user(
        &self,
        id: &str,
        username: &str,
        title: Option<&str>,
        created_at: &str,
    ) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT INTO auth_users (id, username, title, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET username = excluded.username, title = excluded.title",
            params![id, username, title, created_at],
        )?;
        Ok(())
    }

    /// Insert a session row. An id collision is an error, never an
    /// overwrite — overwriting could hijack a concurrently issued session.
    pub fn create_session(&self, session: &NewSession<'_>) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT INTO auth_sessions
                 (id, user_id, provider, access_token, refresh_token, scope, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                session.user_id,
                session.provider,
                session.access_token,
                session.refresh_token,
                session.scope,
                session.expires_at,
                session.created_at,
            ],
        )?;
        Ok(())
    }

    /// Single-row join lookup. Absence signals "unauthenticated", not an error.
    pub fn get_session_with_user(&self, session_id: &str) -> rusqlite::Result<Option<SessionUser>> {
        self.conn()
            .query_row(
                "SELECT s.id, s.provider, u.id, u.username, u.title
                 FROM auth_sessions s JOIN auth_users u ON s.user_id = u.id
                 WHERE s.id = ?1",
                [session_id],
                |row| {
                    Ok(SessionUser {
                        session_id: row.get(0)?,
                        provider: row.get(1)?,
                        user_id: row.get(2)?,
                        username: row.get(3)?,
                        title: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    /// Idempotent: deleting an absent id is not an error.
    pub fn delete_session(&self, session_id: &str) -> rusqlite::Result<()> {
        self.conn()
            .execute("DELETE FROM auth_sessions WHERE id = ?1", [session_id])?;
        Ok(())
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("boardside.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let migrations = vec![("0001_init", include_str!("../../../migrations/0001_init.sql"))];

    for (name, sql) in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{NewSession, init_db};

    fn new_session<'a>(id: &'a str, user_id: &'a str) -> NewSession<'a> {
        NewSession {
            id,
            user_id,
            provider: "lichess",
            access_token: "lio_token",
            refresh_token: None,
            scope: "board:play",
            expires_at: None,
            created_at: "2026-08-30T12:00:00.000Z",
        }
    }

    #[test]
    fn upsert_keeps_one_row_with_latest_profile() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = init_db(dir.path()).expect("init db");

        db.upsert_user("thib", "oldname", None, "2026-01-01T00:00:00.000Z")
            .expect("first insert");
        db.upsert_user("thib", "newname", Some("GM"), "2026-08-30T00:00:00.000Z")
            .expect("second upsert");

        let conn = db.conn();
        let (count, username, title, created_at): (i64, String, Option<String>, String) = conn
            .query_row(
                "SELECT COUNT(*), username, title, created_at FROM auth_users WHERE id = 'thib'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .expect("row present");
        assert_eq!(count, 1);
        assert_eq!(username, "newname");
        assert_eq!(title.as_deref(), Some("GM"));
        // created_at is immutable across upserts
        assert_eq!(created_at, "2026-01-01T00:00:00.000Z");
    }

    #[test]
    fn session_join_returns_user_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = init_db(dir.path()).expect("init db");

        db.upsert_user("thib", "thibault", Some("IM"), "2026-08-30T00:00:00.000Z")
            .expect("user");
        db.create_session(&new_session("sess-1", "thib"))
            .expect("session");

        let joined = db
            .get_session_with_user("sess-1")
            .expect("query ok")
            .expect("row present");
        assert_eq!(joined.session_id, "sess-1");
        assert_eq!(joined.provider, "lichess");
        assert_eq!(joined.user_id, "thib");
        assert_eq!(joined.username, "thibault");
        assert_eq!(joined.title.as_deref(), Some("IM"));

        assert!(
            db.get_session_with_user("absent")
                .expect("query ok")
                .is_none()
        );
    }

    #[test]
    fn duplicate_session_id_is_rejected_not_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = init_db(dir.path()).expect("init db");

        db.upsert_user("a", "alice", None, "2026-08-30T00:00:00.000Z")
            .expect("user a");
        db.upsert_user("b", "bob", None, "2026-08-30T00:00:00.000Z")
            .expect("user b");

        db.create_session(&new_session("sess-1", "a"))
            .expect("first insert");
        assert!(db.create_session(&new_session("sess-1", "b")).is_err());

        // Original row untouched
        let joined = db
            .get_session_with_user("sess-1")
            .expect("query ok")
            .expect("row present");
        assert_eq!(joined.user_id, "a");
    }

    #[test]
    fn delete_session_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = init_db(dir.path()).expect("init db");

        db.upsert_user("thib", "thibault", None, "2026-08-30T00:00:00.000Z")
            .expect("user");
        db.create_session(&new_session("sess-1", "thib"))
            .expect("session");

        db.delete_session("sess-1").expect("first delete");
        db.delete_session("sess-1").expect("second delete is fine");
        db.delete_session("never-existed").expect("absent id is fine");

        assert!(
            db.get_session_with_user("sess-1")
                .expect("query ok")
                .is_none()
        );
    }
}
