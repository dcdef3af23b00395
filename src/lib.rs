use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::backend::{DocumentStore, IdentityProvider, ObjectStore};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Backend handles shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub mod backend;
pub mod config;
pub mod error;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod setup;
pub mod view;
