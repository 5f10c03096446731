//! SQLite-backed document store client.
//!
//! # Responsibility
//! - Persist JSON object documents grouped by collection name.
//! - Assign document ids at insert time.
//! - Publish a monotonically increasing revision after every committed write.
//! - Keep listing readable when individual stored bodies are corrupt.
//!
//! # Invariants
//! - Every SQLite call runs on tokio's blocking pool, never on the caller's
//!   task.
//! - After `close`, all operations fail with `StoreError::Closed` and every
//!   revision watcher observes the channel closing.

use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::watch;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Document store errors.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    DocumentNotFound { collection: String, id: String },
    CorruptDocument { id: String, message: String },
    Encode(serde_json::Error),
    Closed,
    Poisoned,
    NoRuntime,
    Task(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DocumentNotFound { collection, id } => {
                write!(f, "document not found: {collection}/{id}")
            }
            Self::CorruptDocument { id, message } => {
                write!(f, "stored document `{id}` is not a JSON object: {message}")
            }
            Self::Encode(err) => write!(f, "failed to encode document: {err}"),
            Self::Closed => write!(f, "store client is closed"),
            Self::Poisoned => write!(f, "store connection lock poisoned"),
            Self::NoRuntime => write!(f, "no tokio runtime available for store call"),
            Self::Task(message) => write!(f, "store task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// One document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Store-assigned id, unique within its collection.
    pub id: String,
    /// Top-level document fields.
    pub fields: Map<String, Value>,
}

/// Connection handle to the document store.
///
/// Construct once at process start, share by `Arc`, and `close` at shutdown.
pub struct StoreClient {
    project_id: String,
    conn: Arc<Mutex<Option<Connection>>>,
    revisions: Mutex<Option<watch::Sender<u64>>>,
}

impl StoreClient {
    /// Opens the project database file named by `config`.
    pub fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let conn = open_db(config.database_path())?;
        info!(
            "event=store_connect module=store status=ok mode=file project_id={} app_id={}",
            config.project_id, config.app_id
        );
        Ok(Self::from_connection(config.project_id.clone(), conn))
    }

    /// Opens a private in-memory database; contents vanish on close.
    pub fn connect_in_memory(config: &StoreConfig) -> StoreResult<Self> {
        let conn = open_db_in_memory()?;
        info!(
            "event=store_connect module=store status=ok mode=memory project_id={}",
            config.project_id
        );
        Ok(Self::from_connection(config.project_id.clone(), conn))
    }

    fn from_connection(project_id: String, conn: Connection) -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            project_id,
            conn: Arc::new(Mutex::new(Some(conn))),
            revisions: Mutex::new(Some(sender)),
        }
    }

    pub fn project_id(&self) -> &str {
        self.project_id.as_str()
    }

    /// Returns whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.revisions
            .lock()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }

    /// Inserts a new document and returns it with its assigned id.
    pub async fn add_document(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<StoredDocument> {
        let doc_id = Uuid::new_v4().simple().to_string();
        let body = serde_json::to_string(&fields)?;
        let collection_name = collection.to_string();
        let insert_id = doc_id.clone();

        self.write("add", collection, move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3);",
                params![collection_name, insert_id, body],
            )?;
            Ok(true)
        })
        .await?;

        Ok(StoredDocument { id: doc_id, fields })
    }

    /// Lists every document of one collection in insertion order.
    ///
    /// Rows whose body is not a JSON object are logged and left out.
    pub async fn list_documents(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        let collection = collection.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT doc_id, body
                 FROM documents
                 WHERE collection = ?1
                 ORDER BY seq ASC;",
            )?;
            let mut rows = stmt.query([collection.as_str()])?;
            let mut documents = Vec::new();
            while let Some(row) = rows.next()? {
                let id: String = row.get("doc_id")?;
                let body: String = row.get("body")?;
                match parse_body(&id, &body) {
                    Ok(fields) => documents.push(StoredDocument { id, fields }),
                    Err(err) => warn!(
                        "event=doc_list module=store status=skipped collection={} error={}",
                        collection, err
                    ),
                }
            }
            Ok(documents)
        })
        .await
    }

    /// Merges `patch` into the top-level fields of one document.
    ///
    /// Fields absent from `patch` are left untouched.
    pub async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<()> {
        let collection_name = collection.to_string();
        let doc_id = id.to_string();

        self.write("update", collection, move |conn| {
            let tx = conn.transaction()?;
            let body: Option<String> = tx
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                    params![collection_name, doc_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(body) = body else {
                return Err(StoreError::DocumentNotFound {
                    collection: collection_name,
                    id: doc_id,
                });
            };

            let mut fields = parse_body(&doc_id, &body)?;
            fields.extend(patch);
            let merged = serde_json::to_string(&fields)?;
            tx.execute(
                "UPDATE documents
                 SET body = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE collection = ?1 AND doc_id = ?2;",
                params![collection_name, doc_id, merged],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map(|_| ())
    }

    /// Deletes one document. Returns whether it existed.
    pub async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let collection_name = collection.to_string();
        let doc_id = id.to_string();
        self.write("delete", collection, move |conn| {
            let changed = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                params![collection_name, doc_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Returns a receiver that observes every committed write.
    pub fn watch_revisions(&self) -> StoreResult<watch::Receiver<u64>> {
        let guard = self.revisions.lock().map_err(|_| StoreError::Poisoned)?;
        guard
            .as_ref()
            .map(watch::Sender::subscribe)
            .ok_or(StoreError::Closed)
    }

    /// Releases the connection and ends every revision watcher.
    ///
    /// Repeated calls are no-ops.
    pub fn close(&self) {
        let sender = self
            .revisions
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or(None);
        let conn = self.conn.lock().map(|mut guard| guard.take()).unwrap_or(None);
        if sender.is_some() || conn.is_some() {
            info!(
                "event=store_close module=store status=ok project_id={}",
                self.project_id
            );
        }
    }

    async fn write<F>(&self, op: &'static str, collection: &str, f: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut Connection) -> StoreResult<bool> + Send + 'static,
    {
        let changed = self.with_conn(f).await?;
        if changed {
            if let Ok(guard) = self.revisions.lock() {
                if let Some(sender) = guard.as_ref() {
                    sender.send_modify(|revision| *revision += 1);
                }
            }
        }
        debug!(
            "event=doc_write module=store status=ok op={} collection={} changed={}",
            op, collection, changed
        );
        Ok(changed)
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let conn = Arc::clone(&self.conn);
        runtime
            .spawn_blocking(move || {
                let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
                let conn = guard.as_mut().ok_or(StoreError::Closed)?;
                f(conn)
            })
            .await
            .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

impl Drop for StoreClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_body(id: &str, body: &str) -> StoreResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::CorruptDocument {
            id: id.to_string(),
            message: format!("found {}", json_kind(&other)),
        }),
        Err(err) => Err(StoreError::CorruptDocument {
            id: id.to_string(),
            message: err.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
