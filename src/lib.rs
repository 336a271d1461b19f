//! # Grimoire
//!
//! A normalized local cache of tabletop rules content (spells, creatures,
//! equipment, ...). Records arrive from two generations of a structured
//! API and from user OrcBrew files, each with its own field shapes; the
//! core normalizer maps them onto one canonical entity per kind, and this
//! crate stores them in SQLite and serves filtered lookups.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌─────────────┐
//! │   Readers    │──▶│   grimoire-core    │──▶│   SQLite    │
//! │ OrcBrew/JSON │   │ coerce + normalize │   │ entities_*  │
//! └──────────────┘   └────────────────────┘   └──────┬──────┘
//!                                                    │
//!                       ┌────────────────────────────┤
//!                       ▼                            ▼
//!                ┌─────────────┐              ┌─────────────┐
//!                │   search    │              │  documents  │
//!                └─────────────┘              └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Per-kind schema creation |
//! | [`sqlite_store`] | SQLite [`EntityStore`](grimoire_core::EntityStore) |
//! | [`reader_orcbrew`] | OrcBrew/EDN file reader |
//! | [`reader_json`] | API JSON dump reader |
//! | [`ingest`] | Import orchestration and import log |
//! | [`search`] | `grim search` |
//! | [`get`] | `grim get` |
//! | [`documents`] | `grim documents` |
//! | [`stats`] | `grim stats` and `grim purge` |

pub mod config;
pub mod db;
pub mod documents;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod reader_json;
pub mod reader_orcbrew;
pub mod search;
pub mod sqlite_store;
pub mod stats;

pub use grimoire_core as core;
