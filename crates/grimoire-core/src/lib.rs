//! # Grimoire Core
//!
//! Storage-agnostic logic for grimoire: the entity model, collection
//! coercion, the canonical normalizer and its alias tables, document
//! metadata extraction, the store abstraction, the query/filter engine, and
//! document discovery.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. The application
//! crate supplies a SQLite-backed [`store::EntityStore`] and the file
//! readers.
//!
//! # Write path
//!
//! ```text
//! reader → RawRecord → coerce → normalize (+ extract_document) → EntityStore
//! ```
//!
//! # Read path
//!
//! ```text
//! SearchRequest → query::search → EntityStore::query
//! discovery::list_documents → EntityStore::document_counts
//! ```

pub mod coerce;
pub mod discovery;
pub mod document;
pub mod edn;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;

pub use error::{IngestError, NormalizationError, QueryError};
pub use models::{AttrValue, DocumentRef, DocumentSummary, Entity, EntityKind, SourceOrigin};
pub use normalize::{normalize, RawRecord};
pub use query::{search, QueryLimits, SearchRequest};
pub use store::EntityStore;
