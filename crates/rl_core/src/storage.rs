use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use crate::Result;

/// Largest value set a single `find_in` query may carry.
pub const MAX_IN_QUERY_VALUES: usize = 30;

const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Sentinel replaced by the store's clock when the document is written.
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(sentinel)
}

fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)),
        _ => false,
    }
}

/// Replaces every server timestamp sentinel inside `value` with `now`.
pub fn resolve_server_timestamps(value: &mut Value, now: DateTime<Utc>) {
    if is_server_timestamp(value) {
        *value = Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true));
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(|v| resolve_server_timestamps(v, now)),
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_server_timestamps(v, now)),
        _ => {}
    }
}

/// Looks up a dotted field path such as `reflection.usefulness`.
pub fn field<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, key| current.get(key))
}

/// Overwrites the top-level fields of `target` with those of `patch`.
pub fn apply_patch(target: &mut Value, patch: &Map<String, Value>) {
    if let Value::Object(map) = target {
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Articles,
    Jobs,
    Recommendations,
    Profile,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Articles => "articles",
            Collection::Jobs => "jobs",
            Collection::Recommendations => "recommendations",
            Collection::Profile => "profile",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-user collection, e.g. `users/{uid}/articles`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub user_id: String,
    pub collection: Collection,
}

impl Scope {
    pub fn new(user_id: impl Into<String>, collection: Collection) -> Self {
        Self {
            user_id: user_id.into(),
            collection,
        }
    }

    pub fn articles(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Collection::Articles)
    }

    pub fn jobs(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Collection::Jobs)
    }

    pub fn recommendations(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Collection::Recommendations)
    }

    pub fn profile(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Collection::Profile)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/{}", self.user_id, self.collection)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    pub fn field(&self, path: &str) -> Option<&Value> {
        field(&self.data, path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { scope: Scope, id: String, data: Value },
    Update { scope: Scope, id: String, patch: Map<String, Value> },
    Delete { scope: Scope, id: String },
}

/// Writes committed together: either all of them land or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, scope: Scope, id: impl Into<String>, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set { scope, id: id.into(), data });
        self
    }

    pub fn update(&mut self, scope: Scope, id: impl Into<String>, patch: Map<String, Value>) -> &mut Self {
        self.ops.push(WriteOp::Update { scope, id: id.into(), patch });
        self
    }

    pub fn delete(&mut self, scope: Scope, id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { scope, id: id.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Per-user document store with collection addressing and server timestamps.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// Generate an id for a document that is about to be created
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn get(&self, scope: &Scope, id: &str) -> Result<Option<Document>>;

    /// Create or replace a document
    async fn set(&self, scope: &Scope, id: &str, data: Value) -> Result<()>;

    /// Merge top-level fields into an existing document, failing if it does not exist
    async fn update(&self, scope: &Scope, id: &str, patch: Map<String, Value>) -> Result<()>;

    async fn delete(&self, scope: &Scope, id: &str) -> Result<()>;

    async fn list(&self, scope: &Scope) -> Result<Vec<Document>>;

    /// Documents whose `field` equals `value`; `field` may be a dotted path
    async fn find_eq(&self, scope: &Scope, field: &str, value: &Value) -> Result<Vec<Document>>;

    /// Documents whose string `field` is one of `values` (at most `MAX_IN_QUERY_VALUES`)
    async fn find_in(&self, scope: &Scope, field: &str, values: &[String]) -> Result<Vec<Document>>;

    /// Apply every write of the batch atomically
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}
