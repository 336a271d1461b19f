//! Import orchestration.
//!
//! Walks a file or directory, hands each file to its reader, and feeds the
//! records through [`ingest_batch`]: one atomic batch per `(file, kind)`.
//!
//! | Extension | Reader | Kind |
//! |-----------|--------|------|
//! | `.orcbrew`, `.edn` | [`reader_orcbrew`] | from each plugin key |
//! | `.json` | [`reader_json`] | `--kind` (required) |
//!
//! OrcBrew files fall back to `import.default_origin` when no `--origin` is
//! given. JSON dumps come from an API, whose provenance lives in the record
//! itself, so they need an explicit `--origin`.
//!
//! Unreadable files are reported and skipped; store failures abort the run.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use walkdir::WalkDir;

use grimoire_core::pipeline::{ingest_batch, IngestReport};
use grimoire_core::{EntityKind, SourceOrigin};

use crate::config::Config;
use crate::db;
use crate::reader_json;
use crate::reader_orcbrew;
use crate::sqlite_store::SqliteStore;

/// Result of one `grim import` run.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub files_read: usize,
    pub unreadable: Vec<(PathBuf, String)>,
    pub reports: Vec<(PathBuf, IngestReport)>,
}

impl ImportSummary {
    pub fn imported(&self) -> usize {
        self.reports.iter().map(|(_, r)| r.imported).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|(_, r)| r.skipped.len()).sum()
    }
}

enum FileFormat {
    OrcBrew,
    Json,
}

fn file_format(path: &Path) -> Option<FileFormat> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("orcbrew") | Some("edn") => Some(FileFormat::OrcBrew),
        Some("json") => Some(FileFormat::Json),
        _ => None,
    }
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Import path does not exist: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && file_format(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Import every supported file under `path`.
///
/// `origin` is the explicit `--origin`; `default_origin` applies to OrcBrew
/// files only.
pub async fn import_path(
    store: &SqliteStore,
    path: &Path,
    origin: Option<SourceOrigin>,
    default_origin: SourceOrigin,
    kind: Option<EntityKind>,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for file in collect_files(path)? {
        let (file_origin, batches) = match file_format(&file) {
            Some(FileFormat::OrcBrew) => (
                origin.unwrap_or(default_origin),
                reader_orcbrew::read_file(&file).map(|batches| {
                    batches
                        .into_iter()
                        .filter(|(k, _)| kind.map_or(true, |wanted| wanted == *k))
                        .collect::<Vec<_>>()
                }),
            ),
            Some(FileFormat::Json) => {
                let Some(kind) = kind else {
                    bail!(
                        "--kind is required to import JSON ({})",
                        file.display()
                    );
                };
                let Some(origin) = origin else {
                    bail!(
                        "--origin is required to import JSON ({}): one of api-primary, api-secondary",
                        file.display()
                    );
                };
                (origin, reader_json::read_file(&file).map(|records| vec![(kind, records)]))
            }
            None => {
                debug!(path = %file.display(), "unsupported file type, skipping");
                continue;
            }
        };

        let batches = match batches {
            Ok(batches) => batches,
            Err(e) => {
                warn!(path = %file.display(), error = %format!("{:#}", e), "skipping unreadable file");
                summary.unreadable.push((file, format!("{:#}", e)));
                continue;
            }
        };
        summary.files_read += 1;

        for (kind, records) in batches {
            let report = ingest_batch(store, &records, file_origin, kind).await?;
            log_import(store.pool(), &report, &file).await?;
            summary.reports.push((file.clone(), report));
        }
    }

    Ok(summary)
}

/// Record one batch in `import_log`.
pub async fn log_import(pool: &SqlitePool, report: &IngestReport, path: &Path) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO import_log (kind, source_origin, path, imported, skipped, imported_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.kind.as_str())
    .bind(report.origin.as_str())
    .bind(path.display().to_string())
    .bind(report.imported as i64)
    .bind(report.skipped.len() as i64)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Run `grim import`: import, then print a per-batch summary.
pub async fn run_import(
    config: &Config,
    path: &Path,
    origin: Option<SourceOrigin>,
    kind: Option<EntityKind>,
) -> Result<()> {
    let default_origin = config.import.origin()?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let summary = import_path(&store, path, origin, default_origin, kind).await?;

    println!("import {}", path.display());
    println!("  files read: {}", summary.files_read);
    for (file, error) in &summary.unreadable {
        println!("  unreadable: {} ({})", file.display(), error);
    }
    for (file, report) in &summary.reports {
        println!(
            "  {} [{}] from {}: {} imported, {} skipped",
            report.kind,
            report.origin,
            file.display(),
            report.imported,
            report.skipped.len()
        );
        for skipped in &report.skipped {
            println!(
                "    #{} {}: {}",
                skipped.index,
                skipped.identifier_hint.as_deref().unwrap_or("?"),
                skipped.error
            );
        }
    }
    println!("  total: {} imported, {} skipped", summary.imported(), summary.skipped());
    println!("ok");

    pool.close().await;
    Ok(())
}
