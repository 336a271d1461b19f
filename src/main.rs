//! # Grimoire CLI (`grim`)
//!
//! Local cache for tabletop rules content: import OrcBrew books and API
//! dumps, then search them.
//!
//! ## Usage
//!
//! ```bash
//! grim --config ./config/grimoire.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `grim init` | Create the SQLite database and per-kind tables |
//! | `grim import <path>` | Import `.orcbrew`/`.edn`/`.json` files |
//! | `grim search <kind>` | Filtered search within one kind |
//! | `grim get <kind> <id>` | Show one cached entity |
//! | `grim documents` | List cached documents with counts |
//! | `grim purge <kind>` | Remove every cached entity of a kind |
//! | `grim stats` | Counts per kind and recent imports |
//!
//! ## Examples
//!
//! ```bash
//! grim init
//! grim import ./homebrew/frozen-north.orcbrew
//! grim import ./dumps/spells.json --origin api-primary --kind spell
//! grim search spell --name "fire*" --document srd-2014 --filter level_max=3
//! grim search creature --filter challenge_rating_min=1/2 --filter creature_type=undead
//! ```
//!
//! Logs go to stderr; set `GRIMOIRE_LOG` (e.g. `GRIMOIRE_LOG=grimoire=debug`)
//! to change verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use grimoire::{config, documents, get, ingest, migrate, search, stats};
use grimoire_core::{EntityKind, SourceOrigin};

/// Grimoire: a normalized local cache of tabletop rules content.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/grimoire.example.toml`.
#[derive(Parser)]
#[command(
    name = "grim",
    about = "Grimoire: a normalized local cache of tabletop rules content",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/grimoire.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file, one table per entity kind, the document
    /// metadata table and the import log. Safe to run repeatedly.
    Init,

    /// Import a file or a directory of files.
    Import {
        /// File or directory to import.
        path: PathBuf,

        /// Source origin tag (api-primary, api-secondary, user-import).
        /// Required for JSON; OrcBrew files default to `import.default_origin`.
        #[arg(long)]
        origin: Option<SourceOrigin>,

        /// Entity kind. Required for JSON; for OrcBrew, imports only this kind.
        #[arg(long)]
        kind: Option<EntityKind>,
    },

    /// Search one entity kind.
    Search {
        /// Entity kind (spell, creature, magic_item, ...).
        kind: EntityKind,

        /// Name lookup; `*` is a wildcard. Without one, falls back to identifier.
        #[arg(long)]
        name: Option<String>,

        /// Restrict to these document keys (repeatable).
        #[arg(long = "document")]
        documents: Vec<String>,

        /// Attribute filter `key=value` (repeatable). `<attr>_min`/`<attr>_max` for ranges.
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one entity by identifier.
    Get {
        kind: EntityKind,
        identifier: String,

        #[arg(long)]
        json: bool,
    },

    /// List cached documents with per-kind entity counts.
    Documents {
        #[arg(long)]
        json: bool,
    },

    /// Remove every cached entity of a kind.
    Purge { kind: EntityKind },

    /// Show cache statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("GRIMOIRE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { path, origin, kind } => {
            ingest::run_import(&cfg, &path, origin, kind).await?;
        }
        Commands::Search {
            kind,
            name,
            documents,
            filters,
            limit,
            json,
        } => {
            search::run_search(&cfg, kind, name, documents, &filters, limit, json).await?;
        }
        Commands::Get {
            kind,
            identifier,
            json,
        } => {
            get::run_get(&cfg, kind, &identifier, json).await?;
        }
        Commands::Documents { json } => {
            documents::run_documents(&cfg, json).await?;
        }
        Commands::Purge { kind } => {
            stats::run_purge(&cfg, kind).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
