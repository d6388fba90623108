use async_trait::async_trait;
use chrono::Utc;
use rl_core::config::AppConfig;
use rl_core::storage::{apply_patch, field, resolve_server_timestamps, MAX_IN_QUERY_VALUES};
use rl_core::{Document, DocumentStore, Error, Result, Scope, WriteBatch, WriteOp};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use std::sync::Arc;
use crate::StorageBackend;

const BOOTSTRAP: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        user_id TEXT NOT NULL,
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (user_id, collection, id)
    )
"#;

fn db_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

impl SQLiteStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        Self::new_with_path(&config.database_path).await
    }

    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        sqlx::query(BOOTSTRAP)
            .execute(&pool)
            .await
            .map_err(db_err("Failed to create documents table"))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn fetch_one(tx: &mut Transaction<'_, Sqlite>, scope: &Scope, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT data FROM documents WHERE user_id = ? AND collection = ? AND id = ?")
            .bind(&scope.user_id)
            .bind(scope.collection.as_str())
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err("Failed to read document"))?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("data").map_err(db_err("Failed to decode document"))?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn write_one(tx: &mut Transaction<'_, Sqlite>, scope: &Scope, id: &str, data: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents (user_id, collection, id, data)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&scope.user_id)
        .bind(scope.collection.as_str())
        .bind(id)
        .bind(serde_json::to_string(data)?)
        .execute(&mut **tx)
        .await
        .map_err(db_err("Failed to write document"))?;
        Ok(())
    }

    async fn apply_op(tx: &mut Transaction<'_, Sqlite>, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::Set { scope, id, mut data } => {
                resolve_server_timestamps(&mut data, Utc::now());
                Self::write_one(tx, &scope, &id, &data).await
            }
            WriteOp::Update { scope, id, patch } => {
                let mut existing = Self::fetch_one(tx, &scope, &id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("{}/{}", scope, id)))?;
                let mut patch = Value::Object(patch);
                resolve_server_timestamps(&mut patch, Utc::now());
                if let Value::Object(patch) = patch {
                    apply_patch(&mut existing, &patch);
                }
                Self::write_one(tx, &scope, &id, &existing).await
            }
            WriteOp::Delete { scope, id } => {
                sqlx::query("DELETE FROM documents WHERE user_id = ? AND collection = ? AND id = ?")
                    .bind(&scope.user_id)
                    .bind(scope.collection.as_str())
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
                    .map_err(db_err("Failed to delete document"))?;
                Ok(())
            }
        }
    }

    async fn run(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to open transaction"))?;
        for op in ops {
            // Dropping the transaction on error rolls it back.
            Self::apply_op(&mut tx, op).await?;
        }
        tx.commit().await.map_err(db_err("Failed to commit transaction"))
    }
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at the configured RL_DATABASE_PATH"
    }

    async fn new(config: &AppConfig) -> Result<Self> where Self: Sized {
        SQLiteStorage::new(config).await
    }
}

#[async_trait]
impl DocumentStore for SQLiteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, scope: &Scope, id: &str) -> Result<Option<Document>> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to open transaction"))?;
        let data = Self::fetch_one(&mut tx, scope, id).await?;
        Ok(data.map(|data| Document { id: id.to_string(), data }))
    }

    async fn set(&self, scope: &Scope, id: &str, data: Value) -> Result<()> {
        self.run(vec![WriteOp::Set { scope: scope.clone(), id: id.to_string(), data }]).await
    }

    async fn update(&self, scope: &Scope, id: &str, patch: Map<String, Value>) -> Result<()> {
        self.run(vec![WriteOp::Update { scope: scope.clone(), id: id.to_string(), patch }]).await
    }

    async fn delete(&self, scope: &Scope, id: &str) -> Result<()> {
        self.run(vec![WriteOp::Delete { scope: scope.clone(), id: id.to_string() }]).await
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE user_id = ? AND collection = ? ORDER BY id")
            .bind(&scope.user_id)
            .bind(scope.collection.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list documents"))?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(db_err("Failed to decode document id"))?;
            let raw: String = row.try_get("data").map_err(db_err("Failed to decode document"))?;
            documents.push(Document { id, data: serde_json::from_str(&raw)? });
        }
        Ok(documents)
    }

    async fn find_eq(&self, scope: &Scope, path: &str, value: &Value) -> Result<Vec<Document>> {
        let documents = self.list(scope).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| field(&doc.data, path) == Some(value))
            .collect())
    }

    async fn find_in(&self, scope: &Scope, path: &str, values: &[String]) -> Result<Vec<Document>> {
        if values.len() > MAX_IN_QUERY_VALUES {
            return Err(Error::QueryTooLarge(values.len(), MAX_IN_QUERY_VALUES));
        }
        let documents = self.list(scope).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| {
                field(&doc.data, path)
                    .and_then(Value::as_str)
                    .map_or(false, |v| values.iter().any(|candidate| candidate == v))
            })
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.run(batch.into_ops()).await
    }
}
