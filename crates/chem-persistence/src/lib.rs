//! Persistencia relacional del catálogo de moléculas.
//!
//! `CatalogStore` implementa `chem_domain::CatalogRepository` sobre Diesel
//! con un pool r2d2. SQLite es el backend por defecto; la feature `pg`
//! compila contra Postgres. Las migraciones viajan embebidas en el binario.

mod config;
mod rows;
pub mod schema;
mod store;

pub use config::{StoreConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DATABASE_URL, DEFAULT_POOL_SIZE};
pub use store::{CatalogStore, DbConn, MIGRATIONS};
