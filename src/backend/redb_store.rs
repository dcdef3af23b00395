use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;
use uuid::Uuid;

use super::{
    BackendError, Collection, Document, DocumentStore, DocumentSubscription, Fields,
    ListenerRegistry, NewDocument, Query,
};

// Each collection is one table of id -> JSON body.
pub const POSTS: TableDefinition<&str, &str> = TableDefinition::new("posts");
pub const COMMENTS: TableDefinition<&str, &str> = TableDefinition::new("comments");

fn table_for(collection: Collection) -> TableDefinition<'static, &'static str, &'static str> {
    match collection {
        Collection::Posts => POSTS,
        Collection::Comments => COMMENTS,
    }
}

fn parse_fields(json: &str) -> Result<Fields, BackendError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(BackendError::Unavailable("stored document is not a JSON object".to_string())),
    }
}

/// Creates every collection table so read transactions never hit a missing
/// table. Safe to call on an existing database.
pub fn ensure_collections(db: &Database) -> Result<(), BackendError> {
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(POSTS)?;
        write_txn.open_table(COMMENTS)?;
    }
    write_txn.commit()?;
    Ok(())
}

/// Persistent document store on an embedded redb file.
pub struct RedbDocumentStore {
    db: Database,
    listeners: Arc<ListenerRegistry>,
}

impl RedbDocumentStore {
    pub fn new(db: Database) -> Result<Self, BackendError> {
        ensure_collections(&db)?;
        Ok(Self {
            db,
            listeners: ListenerRegistry::new(),
        })
    }

    /// Opens the database file, creating it if it does not exist yet.
    pub fn create(path: &Path) -> Result<Self, BackendError> {
        let db = Database::create(path)?;
        Self::new(db)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(query.collection))?;

        let mut documents = Vec::new();
        for entry in table.iter()? {
            let (id, json) = entry?;
            documents.push(Document {
                id: id.value().to_string(),
                fields: parse_fields(json.value())?,
            });
        }
        Ok(query.apply(documents))
    }
}

impl DocumentStore for RedbDocumentStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, BackendError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(collection))?;
        let json = table.get(id)?.map(|guard| guard.value().to_string());

        match json {
            Some(json) => Ok(Some(Document {
                id: id.to_string(),
                fields: parse_fields(&json)?,
            })),
            None => Ok(None),
        }
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        self.run_query(query)
    }

    fn insert(&self, collection: Collection, document: NewDocument) -> Result<String, BackendError> {
        let id = Uuid::new_v4().to_string();
        let fields = document.resolve();
        let json = serde_json::to_string(&fields)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_for(collection))?;
            table.insert(id.as_str(), json.as_str())?;
        }
        write_txn.commit()?;

        self.listeners
            .notify(collection, &[&fields], |query| self.run_query(query));
        Ok(id)
    }

    fn increment(&self, collection: Collection, id: &str, field: &str, by: i64) -> Result<i64, BackendError> {
        // Read-modify-write inside one write transaction; redb serializes
        // writers, which makes the increment atomic.
        let write_txn = self.db.begin_write()?;
        let (fields, value) = {
            let mut table = write_txn.open_table(table_for(collection))?;
            let current = table
                .get(id)?
                .map(|guard| guard.value().to_string())
                .ok_or_else(|| BackendError::NotFound(format!("{}/{}", collection, id)))?;

            let mut fields = parse_fields(&current)?;
            let value = fields.get(field).and_then(Value::as_i64).unwrap_or(0) + by;
            fields.insert(field.to_string(), Value::from(value));

            let json = serde_json::to_string(&fields)?;
            table.insert(id, json.as_str())?;
            (fields, value)
        };
        write_txn.commit()?;

        self.listeners
            .notify(collection, &[&fields], |query| self.run_query(query));
        Ok(value)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(table_for(collection))?;
            let removed = table.remove(id)?.map(|guard| guard.value().to_string());
            removed
        };
        write_txn.commit()?;

        if let Some(json) = removed {
            let fields = parse_fields(&json)?;
            self.listeners
                .notify(collection, &[&fields], |query| self.run_query(query));
        }
        Ok(())
    }

    fn subscribe(&self, query: Query) -> Result<DocumentSubscription, BackendError> {
        self.listeners.register(query, |query| self.run_query(query))
    }
}
