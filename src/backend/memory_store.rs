use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use uuid::Uuid;

use super::{
    BackendError, Collection, Document, DocumentStore, DocumentSubscription, Fields,
    ListenerRegistry, NewDocument, Query,
};

type Collections = HashMap<Collection, HashMap<String, Fields>>;

/// In-process document store. Nothing survives a restart.
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    listeners: Arc<ListenerRegistry>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Number of live subscriptions currently registered.
    pub fn active_subscriptions(&self) -> usize {
        self.listeners.active_count()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(|poisoned| {
            log::error!("Memory document store lock was poisoned! Recovering lock.");
            poisoned.into_inner()
        })
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        let collections = self.lock();
        let documents = collections
            .get(&query.collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            });
        Ok(query.apply(documents))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, BackendError> {
        let collections = self.lock();
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        self.run_query(query)
    }

    fn insert(&self, collection: Collection, document: NewDocument) -> Result<String, BackendError> {
        let id = Uuid::new_v4().to_string();
        let fields = document.resolve();
        self.lock()
            .entry(collection)
            .or_default()
            .insert(id.clone(), fields.clone());

        self.listeners
            .notify(collection, &[&fields], |query| self.run_query(query));
        Ok(id)
    }

    fn increment(&self, collection: Collection, id: &str, field: &str, by: i64) -> Result<i64, BackendError> {
        let (updated, value) = {
            let mut collections = self.lock();
            let fields = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| BackendError::NotFound(format!("{}/{}", collection, id)))?;

            let value = fields.get(field).and_then(Value::as_i64).unwrap_or(0) + by;
            fields.insert(field.to_string(), Value::from(value));
            (fields.clone(), value)
        };

        self.listeners
            .notify(collection, &[&updated], |query| self.run_query(query));
        Ok(value)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError> {
        let removed = self
            .lock()
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));

        if let Some(fields) = removed {
            self.listeners
                .notify(collection, &[&fields], |query| self.run_query(query));
        }
        Ok(())
    }

    fn subscribe(&self, query: Query) -> Result<DocumentSubscription, BackendError> {
        self.listeners.register(query, |query| self.run_query(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Direction;

    #[test]
    fn increment_on_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store
            .increment(Collection::Posts, "missing", "likes", 1)
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[test]
    fn increment_treats_absent_field_as_zero() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert(Collection::Posts, NewDocument::new().set("title", "Larb"))
            .unwrap();
        assert_eq!(store.increment(Collection::Posts, &id, "likes", 1).unwrap(), 1);
        assert_eq!(store.increment(Collection::Posts, &id, "likes", 1).unwrap(), 2);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert(Collection::Comments, NewDocument::new().set("postId", "p1"))
            .unwrap();
        store.delete(Collection::Comments, &id).unwrap();
        store.delete(Collection::Comments, &id).unwrap();
        assert!(store.get(Collection::Comments, &id).unwrap().is_none());
    }

    #[test]
    fn collections_are_independent() {
        let store = MemoryDocumentStore::new();
        store
            .insert(Collection::Posts, NewDocument::new().set("createdAt", 1))
            .unwrap();
        let comments = store
            .query(&Query::collection(Collection::Comments).order_by("createdAt", Direction::Ascending))
            .unwrap();
        assert!(comments.is_empty());
    }
}
