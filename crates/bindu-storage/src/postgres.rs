//! PostgreSQL storage backend.
//!
//! Production backend for multi-instance deployments. When the deployment
//! carries an agent DID, all tables live in a schema derived from it
//! (see [`crate::schema`]), giving per-tenant isolation inside one database.
//!
//! Writes hold a row lock (`SELECT ... FOR UPDATE`) for the validate+mutate
//! window, so concurrent `update_task` calls on one task serialize and
//! readers never observe a partial merge.

use crate::error::StorageError;
use crate::schema::{mask_db_url, sanitize_did_for_schema, sanitize_identifier};
use crate::state_machine;
use crate::traits::{Storage, TaskFilter, TaskUpdate};
use async_trait::async_trait;
use bindu_a2a_protocol::{
    Artifact, Context, Feedback, Message, PushNotificationConfig, Task, TaskKind, TaskState,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// Configuration for the PostgreSQL storage backend.
#[derive(Debug, Clone)]
pub struct PostgresStorageConfig {
    /// Database connection URL (e.g. "postgres://localhost:5432/bindu")
    pub database_url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Minimum number of idle connections
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub connection_timeout_secs: u64,
    /// Default page size for list operations
    pub default_list_limit: usize,
    /// Accumulate a cross-task message history on each context
    pub context_history: bool,
    /// Create the schema and tables on first use
    pub create_tables_if_missing: bool,
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost:5432/bindu".to_string(),
            max_connections: 20,
            min_connections: 2,
            connection_timeout_secs: 30,
            default_list_limit: 100,
            context_history: false,
            create_tables_if_missing: true,
        }
    }
}

/// PostgreSQL-backed storage with per-DID schema isolation.
pub struct PostgresStorage {
    pool: PgPool,
    schema: String,
    config: PostgresStorageConfig,
}

impl PostgresStorage {
    /// Connect and bootstrap. `did` selects the tenant schema; without one
    /// the tables live in `public`.
    pub async fn connect(
        config: PostgresStorageConfig,
        did: Option<&str>,
    ) -> Result<Self, StorageError> {
        let schema = match did {
            Some(did) => sanitize_did_for_schema(did),
            None => "public".to_string(),
        };
        sanitize_identifier(&schema)?;

        info!(
            "Initializing PostgreSQL storage at {} (schema '{}')",
            mask_db_url(&config.database_url),
            schema
        );

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .idle_timeout(Some(std::time::Duration::from_secs(300)))
            .max_lifetime(Some(std::time::Duration::from_secs(1800)))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        let storage = Self {
            pool,
            schema,
            config,
        };

        if storage.config.create_tables_if_missing {
            storage.bootstrap().await?;
        }

        info!("PostgreSQL storage initialized");
        Ok(storage)
    }

    /// Reentrant schema bootstrap: schema creation and table creation run in
    /// separate transactions so concurrent bootstraps of the same tenant do
    /// not deadlock.
    async fn bootstrap(&self) -> Result<(), StorageError> {
        if self.schema != "public" {
            let mut tx = self.pool.begin().await?;
            sqlx::query(&format!(r#"CREATE SCHEMA IF NOT EXISTS "{}""#, self.schema))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            debug!("Ensured schema '{}'", self.schema);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                context_id UUID NOT NULL,
                kind TEXT NOT NULL DEFAULT 'task',
                state TEXT NOT NULL DEFAULT 'submitted',
                state_timestamp TIMESTAMPTZ NOT NULL,
                history JSONB NOT NULL DEFAULT '[]'::jsonb,
                artifacts JSONB NOT NULL DEFAULT '[]'::jsonb,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table("tasks")
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                context_data JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                message_history JSONB,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table("contexts")
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                task_id UUID NOT NULL,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table("task_feedback")
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                task_id UUID PRIMARY KEY,
                url TEXT NOT NULL,
                token TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table("webhook_configs")
        ))
        .execute(&mut *tx)
        .await?;

        let prefix = &self.schema;
        let indexes = [
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_context ON {} (context_id)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_state ON {} (state)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_created ON {} (created_at DESC)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_updated ON {} (updated_at DESC)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_history ON {} USING GIN (history)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_metadata ON {} USING GIN (metadata)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_tasks_artifacts ON {} USING GIN (artifacts)",
                self.table("tasks")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{prefix}_feedback_task ON {} (task_id)",
                self.table("task_feedback")
            ),
        ];
        for index_sql in &indexes {
            sqlx::query(index_sql).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!("PostgreSQL storage migrations completed");
        Ok(())
    }

    /// Schema-qualified table reference. The schema name passed
    /// `sanitize_identifier` at construction, so interpolation is safe.
    fn table(&self, name: &str) -> String {
        format!(r#""{}".{}"#, self.schema, name)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn kind_to_str(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Task => "task",
        TaskKind::Team => "team",
        TaskKind::Workflow => "workflow",
    }
}

fn str_to_kind(s: &str) -> TaskKind {
    match s {
        "team" => TaskKind::Team,
        "workflow" => TaskKind::Workflow,
        _ => TaskKind::Task,
    }
}

fn str_to_state(s: &str) -> Result<TaskState, StorageError> {
    TaskState::parse(s)
        .ok_or_else(|| StorageError::Database(format!("Unknown task state: {}", s)))
}

fn row_to_task(row: &PgRow) -> Result<Task, StorageError> {
    let state_str: String = row.get("state");
    let kind_str: String = row.get("kind");
    let history_json: Value = row.get("history");
    let artifacts_json: Value = row.get("artifacts");
    let metadata_json: Value = row.get("metadata");

    let history: Vec<Message> = serde_json::from_value(history_json)?;
    let artifacts: Vec<Artifact> = serde_json::from_value(artifacts_json)?;
    let metadata: Map<String, Value> = serde_json::from_value(metadata_json)?;

    Ok(Task {
        id: row.get("id"),
        context_id: row.get("context_id"),
        kind: str_to_kind(&kind_str),
        state: str_to_state(&state_str)?,
        state_timestamp: row.get("state_timestamp"),
        history,
        artifacts,
        metadata,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_context(row: &PgRow) -> Result<Context, StorageError> {
    let context_data_json: Value = row.get("context_data");
    let message_history_json: Option<Value> = row.get("message_history");

    Ok(Context {
        context_id: row.get("id"),
        context_data: serde_json::from_value(context_data_json)?,
        message_history: message_history_json
            .map(serde_json::from_value)
            .transpose()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const TASK_COLUMNS: &str =
    "id, context_id, kind, state, state_timestamp, history, artifacts, metadata, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Storage implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for PostgresStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn submit_task(&self, context_id: Uuid, message: Message) -> Result<Task, StorageError> {
        let now = Utc::now();

        let mut message = message;
        message.context_id = Some(context_id);
        let mut task = Task::submitted(context_id, message);
        task.history[0].task_id = Some(task.id);

        // UUIDs inside JSONB are pre-serialized to strings by serde
        let history_json = serde_json::to_value(&task.history)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, context_data, created_at, updated_at)
            VALUES ($1, '{{}}'::jsonb, $2, $2)
            ON CONFLICT (id) DO UPDATE SET updated_at = $2
            "#,
            self.table("contexts")
        ))
        .bind(context_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                id, context_id, kind, state, state_timestamp,
                history, artifacts, metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, '[]'::jsonb, '{{}}'::jsonb, $7, $7)
            "#,
            self.table("tasks")
        ))
        .bind(task.id)
        .bind(context_id)
        .bind(kind_to_str(task.kind))
        .bind(task.state.as_str())
        .bind(task.state_timestamp)
        .bind(&history_json)
        .bind(task.created_at)
        .execute(&mut *tx)
        .await?;

        if self.config.context_history {
            sqlx::query(&format!(
                r#"
                UPDATE {} SET
                    message_history = COALESCE(message_history, '[]'::jsonb) || $1,
                    updated_at = $2
                WHERE id = $3
                "#,
                self.table("contexts")
            ))
            .bind(&history_json)
            .bind(now)
            .bind(context_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(task)
    }

    async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> Result<Task, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent updates on one task
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            TASK_COLUMNS,
            self.table("tasks")
        ))
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::TaskNotFound(task_id))?;

        let current = row_to_task(&row)?;
        if current.state.is_terminal() {
            return Err(StorageError::TerminalState(current.state));
        }
        if let Some(new_state) = update.state {
            state_machine::validate_transition(current.state, new_state)?;
        }

        let mut appended = Vec::with_capacity(update.new_messages.len());
        for mut message in update.new_messages {
            message.task_id = Some(task_id);
            message.context_id = Some(current.context_id);
            appended.push(message);
        }
        let appended_json = serde_json::to_value(&appended)?;
        let artifacts_json = serde_json::to_value(&update.new_artifacts)?;
        let metadata_json = serde_json::to_value(update.metadata.unwrap_or_default())?;

        let (new_state, state_timestamp) = match update.state {
            Some(state) => (state, now),
            None => (current.state, current.state_timestamp),
        };

        let updated_row = sqlx::query(&format!(
            r#"
            UPDATE {} SET
                state = $1,
                state_timestamp = $2,
                history = history || $3,
                artifacts = artifacts || $4,
                metadata = metadata || $5,
                updated_at = $6
            WHERE id = $7
            RETURNING {}
            "#,
            self.table("tasks"),
            TASK_COLUMNS
        ))
        .bind(new_state.as_str())
        .bind(state_timestamp)
        .bind(&appended_json)
        .bind(&artifacts_json)
        .bind(&metadata_json)
        .bind(now)
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;
        let task = row_to_task(&updated_row)?;

        if self.config.context_history && !appended.is_empty() {
            sqlx::query(&format!(
                r#"
                UPDATE {} SET
                    message_history = COALESCE(message_history, '[]'::jsonb) || $1,
                    updated_at = $2
                WHERE id = $3
                "#,
                self.table("contexts")
            ))
            .bind(&appended_json)
            .bind(now)
            .bind(current.context_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(task)
    }

    async fn load_task(
        &self,
        task_id: Uuid,
        history_length: Option<usize>,
    ) -> Result<Option<Task>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            TASK_COLUMNS,
            self.table("tasks")
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        let task = match row {
            Some(ref r) => Some(row_to_task(r)?),
            None => None,
        };
        Ok(match history_length {
            Some(n) => task.map(|t| t.with_history_limit(n)),
            None => task,
        })
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StorageError> {
        let limit = filter.limit.unwrap_or(self.config.default_list_limit) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM {}
            WHERE ($1::text IS NULL OR state = $1)
              AND ($2::uuid IS NULL OR context_id = $2)
            ORDER BY updated_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            TASK_COLUMNS,
            self.table("tasks")
        ))
        .bind(filter.state.map(|s| s.as_str()))
        .bind(filter.context_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect()
    }

    async fn count_tasks(&self, state: Option<TaskState>) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::text IS NULL OR state = $1)",
            self.table("tasks")
        ))
        .bind(state.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn get_context(&self, context_id: Uuid) -> Result<Option<Context>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT id, context_data, message_history, created_at, updated_at FROM {} WHERE id = $1",
            self.table("contexts")
        ))
        .bind(context_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_context(r)?)),
            None => Ok(None),
        }
    }

    async fn list_contexts(&self) -> Result<Vec<Context>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT id, context_data, message_history, created_at, updated_at FROM {} \
             ORDER BY updated_at DESC",
            self.table("contexts")
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_context).collect()
    }

    async fn clear_context(&self, context_id: Uuid) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1",
            self.table("contexts")
        ))
        .bind(context_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(StorageError::ContextNotFound(context_id));
        }

        sqlx::query(&format!(
            "DELETE FROM {} WHERE task_id IN (SELECT id FROM {} WHERE context_id = $1)",
            self.table("task_feedback"),
            self.table("tasks")
        ))
        .bind(context_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE task_id IN (SELECT id FROM {} WHERE context_id = $1)",
            self.table("webhook_configs"),
            self.table("tasks")
        ))
        .bind(context_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE context_id = $1",
            self.table("tasks")
        ))
        .bind(context_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_feedback(&self, task_id: Uuid, payload: Value) -> Result<Feedback, StorageError> {
        let exists: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE id = $1",
            self.table("tasks")
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        if exists.is_none() {
            return Err(StorageError::TaskNotFound(task_id));
        }

        let feedback = Feedback::new(task_id, payload);
        sqlx::query(&format!(
            "INSERT INTO {} (id, task_id, payload, created_at) VALUES ($1, $2, $3, $4)",
            self.table("task_feedback")
        ))
        .bind(feedback.id)
        .bind(feedback.task_id)
        .bind(&feedback.payload)
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await?;

        Ok(feedback)
    }

    async fn get_feedback(&self, task_id: Uuid) -> Result<Vec<Feedback>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT id, task_id, payload, created_at FROM {} WHERE task_id = $1 \
             ORDER BY created_at ASC",
            self.table("task_feedback")
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Feedback {
                id: row.get("id"),
                task_id: row.get("task_id"),
                payload: row.get("payload"),
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
            })
            .collect())
    }

    async fn save_webhook(
        &self,
        task_id: Uuid,
        config: PushNotificationConfig,
    ) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (task_id, url, token, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (task_id) DO UPDATE SET url = $2, token = $3
            "#,
            self.table("webhook_configs")
        ))
        .bind(task_id)
        .bind(&config.url)
        .bind(&config.token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_webhook(
        &self,
        task_id: Uuid,
    ) -> Result<Option<PushNotificationConfig>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT url, token FROM {} WHERE task_id = $1",
            self.table("webhook_configs")
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| PushNotificationConfig {
            url: r.get("url"),
            token: r.get("token"),
        }))
    }

    async fn delete_webhook(&self, task_id: Uuid) -> Result<bool, StorageError> {
        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE task_id = $1",
            self.table("webhook_configs")
        ))
        .bind(task_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(deleted > 0)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}
