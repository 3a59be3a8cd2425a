use async_trait::async_trait;
use proto::{DatabaseError, ThreadId};
use sqlx::{Row, sqlite::SqlitePool};
use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, Checkpointer};

/// SQLite-backed checkpointer; threads survive process restarts.
pub struct SqliteSaver {
    pool: SqlitePool,
}

impl SqliteSaver {
    /// Open (or create) the SQLite database and run migrations
    pub async fn open(db_url: &str) -> Result<Self, DatabaseError> {
        let url = expand_home(db_url);

        if let Some(parent) = std::path::Path::new(&url).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{url}?mode=rwc"))
            .await
            .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        let migrations_dir =
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        let migrator = sqlx::migrate::Migrator::new(migrations_dir.as_path())
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        migrator
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("SQLite checkpoints opened: {url}");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Checkpointer for SqliteSaver {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, DatabaseError> {
        let row = sqlx::query("SELECT state_json FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        row.map(|row| {
            let raw: String = row.get("state_json");
            serde_json::from_str(&raw).map_err(|e| DatabaseError::Encoding(e.to_string()))
        })
        .transpose()
    }

    async fn save(
        &self,
        thread_id: &ThreadId,
        checkpoint: &Checkpoint,
    ) -> Result<(), DatabaseError> {
        let state_json = serde_json::to_string(checkpoint)
            .map_err(|e| DatabaseError::Encoding(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO checkpoints (thread_id, state_json, created_at, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(thread_id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at",
        )
        .bind(thread_id.as_str())
        .bind(&state_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        debug!(
            thread = %thread_id,
            messages = checkpoint.messages.len(),
            pending = checkpoint.pending.is_some(),
            "Checkpoint saved"
        );
        Ok(())
    }
}

/// Expands a leading `~` to `$HOME`.
fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        path.replacen('~', &home, 1)
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proto::{Interrupt, InterruptKind, ToolCall};
    use serde_json::json;

    use super::*;
    use crate::checkpoint::{PendingBatch, PendingCall};
    use crate::llm::ChatMessage;

    async fn open_temp_saver() -> (SqliteSaver, tempfile::TempDir, PathBuf) {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let db_path = tempdir.path().join("nested").join("checkpoints.db");
        let saver = SqliteSaver::open(&db_path.to_string_lossy())
            .await
            .expect("saver should open");
        (saver, tempdir, db_path)
    }

    #[tokio::test]
    async fn open_creates_database_and_parent_dir() {
        let (saver, _tmp, db_path) = open_temp_saver().await;
        assert!(db_path.exists());
        drop(saver);
    }

    #[tokio::test]
    async fn unknown_thread_loads_none() {
        let (saver, _tmp, _path) = open_temp_saver().await;
        let loaded = saver
            .load(&ThreadId::from("missing"))
            .await
            .expect("load");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_replaces_and_reloads_pending_batch() {
        let (saver, _tmp, _path) = open_temp_saver().await;
        let thread = ThreadId::from("thread-1");

        let first = Checkpoint {
            messages: vec![ChatMessage::user("hello")],
            pending: None,
        };
        saver.save(&thread, &first).await.expect("first save");

        let call = ToolCall {
            id: "c1".to_string(),
            name: "Gmail_SendEmail".to_string(),
            arguments: json!({"to": "a@example.com"}),
        };
        let second = Checkpoint {
            messages: vec![
                ChatMessage::user("hello"),
                ChatMessage::assistant_tool_calls(vec![call.clone()]),
            ],
            pending: Some(PendingBatch {
                calls: vec![PendingCall {
                    interrupt: Some(Interrupt::new(
                        "c1",
                        InterruptKind::AuthorizationRequired {
                            tool_name: "Gmail_SendEmail".to_string(),
                            url: "https://auth.example".to_string(),
                            authorization_id: "auth-1".to_string(),
                        },
                    )),
                    ..PendingCall::ready(call)
                }],
            }),
        };
        saver.save(&thread, &second).await.expect("second save");

        let loaded = saver.load(&thread).await.expect("load").expect("present");
        assert_eq!(loaded, second);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkpoints")
            .fetch_one(&saver.pool)
            .await
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        assert_eq!(expand_home("~/db.sqlite"), format!("{home}/db.sqlite"));
        assert_eq!(expand_home("/tmp/db.sqlite"), "/tmp/db.sqlite");
    }
}
