#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use recipe_board::backend::identity::SqliteIdentityProvider;
use recipe_board::backend::media_store::FsObjectStore;
use recipe_board::backend::memory_store::MemoryDocumentStore;
use recipe_board::backend::{
    BackendError, Collection, Document, DocumentStore, DocumentSubscription, ListenerRegistry,
    NewDocument, ObjectStore, Query,
};
use recipe_board::models::NewPost;
use recipe_board::setup::db_setup;
use recipe_board::AppState;

pub const MEDIA_BASE: &str = "http://localhost:8080/media";

fn unavailable() -> BackendError {
    BackendError::Unavailable("injected failure".to_string())
}

/// Memory store whose reads and writes can be made to fail and which counts
/// writes. Live queries run through the flaky reads, so a subscription can
/// be broken after it opened.
#[derive(Default)]
pub struct FlakyDocumentStore {
    pub inner: MemoryDocumentStore,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_live_queries: AtomicBool,
    pub writes: AtomicUsize,
    listeners: Arc<ListenerRegistry>,
}

impl FlakyDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fails the queries re-run for subscribers after a write, leaving
    /// ordinary reads working.
    pub fn set_fail_live_queries(&self, fail: bool) {
        self.fail_live_queries.store(fail, Ordering::SeqCst);
    }

    pub fn active_subscriptions(&self) -> usize {
        self.listeners.active_count()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), BackendError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn live_query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        if self.fail_live_queries.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.query(query)
    }

    fn notify(&self, collection: Collection, fields: Option<Document>) {
        if let Some(doc) = fields {
            self.listeners
                .notify(collection, &[&doc.fields], |query| self.live_query(query));
        }
    }
}

impl DocumentStore for FlakyDocumentStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, BackendError> {
        self.check_read()?;
        self.inner.get(collection, id)
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        self.check_read()?;
        self.inner.query(query)
    }

    fn insert(&self, collection: Collection, document: NewDocument) -> Result<String, BackendError> {
        self.check_write()?;
        let id = self.inner.insert(collection, document)?;
        self.notify(collection, self.inner.get(collection, &id)?);
        Ok(id)
    }

    fn increment(&self, collection: Collection, id: &str, field: &str, by: i64) -> Result<i64, BackendError> {
        self.check_write()?;
        let value = self.inner.increment(collection, id, field, by)?;
        self.notify(collection, self.inner.get(collection, id)?);
        Ok(value)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError> {
        self.check_write()?;
        let removed = self.inner.get(collection, id)?;
        self.inner.delete(collection, id)?;
        self.notify(collection, removed);
        Ok(())
    }

    fn subscribe(&self, query: Query) -> Result<DocumentSubscription, BackendError> {
        self.check_read()?;
        self.listeners.register(query, |query| self.query(query))
    }
}

/// Object store that records calls and can fail uploads or deletes.
#[derive(Default)]
pub struct FlakyObjectStore {
    pub fail_uploads: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub uploads: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl ObjectStore for FlakyObjectStore {
    fn upload(&self, path: &str, _bytes: &[u8]) -> Result<String, BackendError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(format!("{}/{}", MEDIA_BASE, path))
    }

    fn delete(&self, _url: &str) -> Result<(), BackendError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

pub fn new_post(title: &str, content: &str, author: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: content.to_string(),
        author: author.to_string(),
    }
}

pub fn identity_provider() -> SqliteIdentityProvider {
    // One connection: every in-memory SQLite connection is its own database.
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(r2d2_sqlite::SqliteConnectionManager::memory())
        .unwrap();
    db_setup::setup_users_db(&mut pool.get().unwrap()).unwrap();
    SqliteIdentityProvider::with_cost(pool, 4)
}

/// App state over in-memory documents, a temp media directory and an
/// in-memory accounts database.
pub fn app_state(media_dir: &tempfile::TempDir) -> (AppState, Arc<MemoryDocumentStore>) {
    let documents = Arc::new(MemoryDocumentStore::new());
    let objects = FsObjectStore::new(media_dir.path(), MEDIA_BASE).unwrap();
    let state = AppState {
        documents: documents.clone(),
        objects: Arc::new(objects),
        identity: Arc::new(identity_provider()),
    };
    (state, documents)
}
