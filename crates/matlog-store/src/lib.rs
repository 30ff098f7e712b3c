use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matlog_capture::SaveGateway;
use matlog_schema::{SavedSession, SessionRecord, SparringResult, TrainingType};
use rusqlite::{params, Connection, Row};
use tokio::task;
use uuid::Uuid;

/// SQLite-backed session storage. The write path is the `SaveGateway`
/// implementation consumed by the capture flow; `recent` is the read path
/// for history listings. List-valued fields are stored as JSON columns.
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Mutex<Connection>>,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Most recently saved sessions, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<SavedSession>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, created_at, training_type, duration_minutes, sparring_rounds,
                       techniques, sparring_results, positive_notes, struggle_notes, raw_text
                FROM sessions
                ORDER BY created_at DESC, id DESC
                LIMIT ?1
                "#,
            )?;
            let rows = stmt.query_map(params![limit as i64], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row??);
            }
            Ok(sessions)
        })
        .await?
    }
}

#[async_trait]
impl SaveGateway for SessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<Uuid> {
        let training_type = record
            .training_type
            .ok_or_else(|| anyhow!("refusing to save an incomplete record"))?;
        let record = record.clone();
        let db = Arc::clone(&self.db);
        let id = Uuid::new_v4();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            conn.execute(
                r#"
                INSERT INTO sessions (
                    id, created_at, training_type, duration_minutes, sparring_rounds,
                    techniques, sparring_results, positive_notes, struggle_notes, raw_text
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    id.to_string(),
                    Utc::now().to_rfc3339(),
                    training_type.as_str(),
                    record.duration_minutes,
                    record.sparring_rounds,
                    serde_json::to_string(&record.techniques_drilled)?,
                    serde_json::to_string(&record.sparring_results)?,
                    serde_json::to_string(&record.positive_notes)?,
                    serde_json::to_string(&record.struggle_notes)?,
                    record.raw_text,
                ],
            )?;
            Ok::<_, anyhow::Error>(())
        })
        .await??;
        tracing::info!("session {id} saved");
        Ok(id)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            training_type TEXT NOT NULL,
            duration_minutes INTEGER,
            sparring_rounds INTEGER,
            techniques TEXT NOT NULL,
            sparring_results TEXT NOT NULL,
            positive_notes TEXT NOT NULL,
            struggle_notes TEXT NOT NULL,
            raw_text TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at);
        "#,
    )?;
    Ok(())
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Result<SavedSession>> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(1)?;
    let training_type: String = row.get(2)?;
    let duration_minutes: Option<i64> = row.get(3)?;
    let sparring_rounds: Option<i64> = row.get(4)?;
    let techniques: String = row.get(5)?;
    let sparring_results: String = row.get(6)?;
    let positive_notes: String = row.get(7)?;
    let struggle_notes: String = row.get(8)?;
    let raw_text: String = row.get(9)?;

    Ok(build_session(
        id,
        created_at,
        training_type,
        duration_minutes,
        sparring_rounds,
        techniques,
        sparring_results,
        positive_notes,
        struggle_notes,
        raw_text,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_session(
    id: String,
    created_at: String,
    training_type: String,
    duration_minutes: Option<i64>,
    sparring_rounds: Option<i64>,
    techniques: String,
    sparring_results: String,
    positive_notes: String,
    struggle_notes: String,
    raw_text: String,
) -> Result<SavedSession> {
    let training_type = TrainingType::parse(&training_type)
        .ok_or_else(|| anyhow!("unknown training type in row: {training_type}"))?;
    let sparring_results: Vec<SparringResult> = serde_json::from_str(&sparring_results)?;
    Ok(SavedSession {
        id: Uuid::parse_str(&id)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        record: SessionRecord {
            training_type: Some(training_type),
            duration_minutes,
            sparring_rounds,
            techniques_drilled: serde_json::from_str(&techniques)?,
            sparring_results,
            positive_notes: serde_json::from_str(&positive_notes)?,
            struggle_notes: serde_json::from_str(&struggle_notes)?,
            raw_text,
        },
    })
}

#[cfg(test)]
mod tests {
    use matlog_schema::{SparringDirection, TrainingType};

    use super::*;

    fn sample_record() -> SessionRecord {
        let mut record = SessionRecord::new("no-gi, 90 min, caught him with an armbar");
        record.training_type = Some(TrainingType::NoGi);
        record.duration_minutes = Some(90);
        record.sparring_rounds = Some(5);
        record.techniques_drilled = vec!["Armbar".to_string()];
        record.sparring_results = vec![SparringResult {
            direction: SparringDirection::Given,
            technique: "Armbar".to_string(),
        }];
        record.positive_notes = vec!["Armbar setups finally clicked".to_string()];
        record
    }

    #[tokio::test]
    async fn save_then_read_back() {
        let store = SessionStore::open_in_memory().unwrap();
        let record = sample_record();
        let id = store.save(&record).await.unwrap();

        let sessions = store.recent(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].record, record);
    }

    #[tokio::test]
    async fn incomplete_record_is_refused() {
        let store = SessionStore::open_in_memory().unwrap();
        let record = SessionRecord::new("no type here");
        let err = store.save(&record).await.unwrap_err();
        assert!(err.to_string().contains("incomplete"));
        assert!(store.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_respects_limit_and_order() {
        let store = SessionStore::open_in_memory().unwrap();
        for i in 0..3 {
            let mut record = sample_record();
            record.raw_text = format!("session {i}");
            store.save(&record).await.unwrap();
        }
        let sessions = store.recent(2).await.unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let store = SessionStore::open(&path).unwrap();
            store.save(&sample_record()).await.unwrap();
        }
        let store = SessionStore::open(&path).unwrap();
        assert_eq!(store.recent(10).await.unwrap().len(), 1);
    }
}
