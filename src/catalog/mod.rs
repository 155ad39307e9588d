//! Paint catalog: product model, persistence, hybrid retrieval and the
//! maintenance jobs that keep embeddings and AI enrichment current.

pub mod backfill;
pub mod enrich;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;

pub use search::{RetrievalEngine, SearchRequest};
pub use store::{ProductStore, SqliteProductStore};
pub use types::{Environment, NewProduct, Product, ProductFilters, RetrievalResult, SearchMode};
