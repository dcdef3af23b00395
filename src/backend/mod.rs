//! Backend client adapter.
//!
//! The board talks to three remote-style services through the traits in this
//! module: a document store holding the `posts` and `comments` collections, an
//! object store for images, and an identity provider for accounts. Everything
//! above this layer is written against the traits, so the embedded
//! implementations below can be swapped for hosted ones.

use std::cmp::Ordering;
use std::fmt;

use chrono::Utc;
use redb::{CommitError, DatabaseError, StorageError, TableError, TransactionError};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::UserSession;

pub mod identity;
pub mod listeners;
pub mod media_store;
pub mod memory_store;
pub mod redb_store;

pub use listeners::{CancelHandle, DocumentSubscription, ListenerRegistry, Snapshot};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Redb database error: {0}")]
    RedbDatabase(#[from] DatabaseError),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Item not found in backend: {0}")]
    NotFound(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Flat key-value body of a document. The id is kept outside the body.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Posts,
    Comments,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Comments => "comments",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Deserializes the document into a typed model. The id is injected as
    /// the `id` field so models can declare it like any other field.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T, BackendError> {
        let mut fields = self.fields;
        fields.insert("id".to_string(), Value::String(self.id));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// A document about to be inserted. Fields listed in `server_timestamps` are
/// filled by the store with its own clock (epoch milliseconds) at write time.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    fields: Fields,
    server_timestamps: Vec<String>,
}

impl NewDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }

    pub(crate) fn resolve(self) -> Fields {
        let mut fields = self.fields;
        if !self.server_timestamps.is_empty() {
            let now = Utc::now().timestamp_millis();
            for field in self.server_timestamps {
                fields.insert(field, Value::from(now));
            }
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality-filtered, optionally ordered query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn collection(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| fields.get(field) == Some(expected))
    }

    /// Filters and orders an unordered scan of the collection. Ties on the
    /// ordering field fall back to the document id so results are stable.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(&doc.fields))
            .collect();

        match &self.order_by {
            Some((field, direction)) => matched.sort_by(|a, b| {
                let ord = compare_values(a.fields.get(field), b.fields.get(field))
                    .then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }),
            None => matched.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        matched
    }
}

/// Missing values sort first, numbers compare numerically, strings
/// lexicographically. Mixed types fall back to their JSON text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or_default()
                    .partial_cmp(&y.as_f64().unwrap_or_default())
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Generic CRUD + query + live-subscription primitives over independent
/// collections of flat documents. No schema is enforced.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, BackendError>;

    fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError>;

    /// Inserts a document and returns the id assigned to it.
    fn insert(&self, collection: Collection, document: NewDocument) -> Result<String, BackendError>;

    /// Atomically adds `by` to a numeric field (absent counts as zero) and
    /// returns the new value. Fails with `NotFound` if the document is absent.
    fn increment(&self, collection: Collection, id: &str, field: &str, by: i64) -> Result<i64, BackendError>;

    /// Removes a document. Removing an absent document is not an error.
    fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError>;

    /// Opens a live subscription. The current result set is delivered
    /// immediately, then again in full after every change that touches a
    /// document matching the query's filters.
    fn subscribe(&self, query: Query) -> Result<DocumentSubscription, BackendError>;
}

/// Upload-by-path / delete-by-reference storage for binary objects.
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `path` and returns a publicly resolvable URL.
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, BackendError>;

    /// Deletes the object a URL returned by `upload` refers to.
    fn delete(&self, url: &str) -> Result<(), BackendError>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("no account exists for this email")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("password is too weak")]
    WeakPassword,
    #[error("identity backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Email/password identity provider.
pub trait IdentityProvider: Send + Sync {
    fn sign_up(&self, email: &str, password: &str) -> Result<UserSession, AuthError>;

    fn sign_in(&self, email: &str, password: &str) -> Result<UserSession, AuthError>;
}
