use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const FROZEN_NORTH: &str = r#"
{"Frozen North"
 {:orcpub.dnd.e5/spells
  {:frost-lance {:name "Frost Lance" :level 2 :school "evocation"
                 :description "A lance of ice."}
   :rime-ward {:name "Rime Ward" :level 1 :school "abjuration"}}
  :orcpub.dnd.e5/monsters
  {:ice-troll {:name "Ice Troll" :type :giant :challenge 5 :hit-points 84}}
  :orcpub.dnd.e5/languages
  {:giantish {:name "Giantish"}}}}
"#;

const SRD_SPELLS: &str = r#"{
  "count": 2,
  "next": null,
  "results": [
    {"key": "srd_fireball", "name": "Fireball", "level": 3, "school": "Evocation",
     "classes": ["Wizard", "Sorcerer"],
     "document": {"key": "srd-2014", "name": "System Reference Document 5.1"}},
    {"key": "srd_shield", "name": "Shield", "level": 1, "school": "Abjuration",
     "classes": ["Wizard"],
     "document": {"key": "srd-2014", "name": "System Reference Document 5.1"}}
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("homebrew")).unwrap();
    fs::write(files_dir.join("homebrew/frozen-north.orcbrew"), FROZEN_NORTH).unwrap();
    fs::write(files_dir.join("homebrew/notes.txt"), "not an import").unwrap();
    fs::write(files_dir.join("srd-spells.json"), SRD_SPELLS).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/grimoire.sqlite"

[search]
default_limit = 20
max_limit = 100
"#,
        root.display()
    );

    let config_path = config_dir.join("grimoire.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn files(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

fn run_grim(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_grim"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run grim binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// init + import of both fixture files.
fn seeded_env() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let root = files(&config_path);
    let (_, stderr, success) = run_grim(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);

    let homebrew = root.join("homebrew");
    let (_, stderr, success) = run_grim(&config_path, &["import", homebrew.to_str().unwrap()]);
    assert!(success, "orcbrew import failed: {}", stderr);

    let srd = root.join("srd-spells.json");
    let (_, stderr, success) = run_grim(
        &config_path,
        &[
            "import",
            srd.to_str().unwrap(),
            "--kind",
            "spell",
            "--origin",
            "api-primary",
        ],
    );
    assert!(success, "json import failed: {}", stderr);
    (tmp, config_path)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_grim(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, again) = run_grim(&config_path, &["init"]);
    assert!(again, "second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_grim(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_import_orcbrew_directory() {
    let (_tmp, config_path) = setup_test_env();
    run_grim(&config_path, &["init"]);

    let homebrew = files(&config_path).join("homebrew");
    let (stdout, stderr, success) = run_grim(&config_path, &["import", homebrew.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files read: 1"));
    assert!(stdout.contains("spell [user-import]"));
    assert!(stdout.contains("creature [user-import]"));
    assert!(stdout.contains("total: 3 imported, 0 skipped"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_import_json_requires_kind() {
    let (_tmp, config_path) = setup_test_env();
    run_grim(&config_path, &["init"]);

    let srd = files(&config_path).join("srd-spells.json");
    let (_, stderr, success) = run_grim(&config_path, &["import", srd.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("--kind is required"));
}

#[test]
fn test_import_json_requires_origin() {
    let (_tmp, config_path) = setup_test_env();
    run_grim(&config_path, &["init"]);

    let srd = files(&config_path).join("srd-spells.json");
    let (_, stderr, success) = run_grim(&config_path, &["import", srd.to_str().unwrap(), "--kind", "spell"]);
    assert!(!success);
    assert!(stderr.contains("--origin is required"));

    let (stdout, _, _) = run_grim(&config_path, &["documents"]);
    assert!(stdout.contains("No documents cached."));
}

#[test]
fn test_import_reports_unreadable_file() {
    let (_tmp, config_path) = setup_test_env();
    run_grim(&config_path, &["init"]);

    let broken = files(&config_path).join("broken.orcbrew");
    fs::write(&broken, "{\"Book\" {:orcpub.dnd.e5/spells").unwrap();
    let (stdout, stderr, success) = run_grim(&config_path, &["import", broken.to_str().unwrap()]);
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("files read: 0"));
    assert!(stdout.contains("unreadable:"));
}

#[test]
fn test_search_by_name_and_wildcard() {
    let (_tmp, config_path) = seeded_env();

    let (stdout, _, success) = run_grim(&config_path, &["search", "spell", "--name", "FROST LANCE"]);
    assert!(success);
    assert!(stdout.contains("1. Frost Lance [frost-lance]"));
    assert!(stdout.contains("document: frozen-north / user-import"));

    let (stdout, _, success) = run_grim(&config_path, &["search", "spell", "--name", "*ward"]);
    assert!(success);
    assert!(stdout.contains("Rime Ward"));
    assert!(!stdout.contains("Frost Lance"));
}

#[test]
fn test_search_filters_and_documents() {
    let (_tmp, config_path) = seeded_env();

    let (stdout, stderr, success) = run_grim(
        &config_path,
        &[
            "search",
            "spell",
            "--document",
            "srd-2014",
            "--filter",
            "level_max=2",
            "--json",
        ],
    );
    assert!(success, "search failed: {}", stderr);
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["identifier"], "srd_shield");

    let (stdout, _, success) = run_grim(
        &config_path,
        &["search", "creature", "--filter", "challenge_rating_min=4"],
    );
    assert!(success);
    assert!(stdout.contains("Ice Troll"));

    let (stdout, _, success) = run_grim(&config_path, &["search", "spell", "--filter", "classes=wizard"]);
    assert!(success);
    assert!(stdout.contains("Fireball"));
    assert!(stdout.contains("Shield"));
    assert!(!stdout.contains("Frost Lance"));
}

#[test]
fn test_search_limit() {
    let (_tmp, config_path) = seeded_env();
    let (stdout, _, success) = run_grim(&config_path, &["search", "spell", "--limit", "2", "--json"]);
    assert!(success);
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 2);
}

#[test]
fn test_search_unknown_filter_fails() {
    let (_tmp, config_path) = seeded_env();
    let (_, stderr, success) = run_grim(&config_path, &["search", "spell", "--filter", "colour=red"]);
    assert!(!success);
    assert!(stderr.contains("unknown filter field 'colour'"));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = seeded_env();
    let (stdout, _, success) = run_grim(&config_path, &["search", "spell", "--name", "Wish"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_get_entity() {
    let (_tmp, config_path) = seeded_env();

    let (stdout, stderr, success) = run_grim(&config_path, &["get", "spell", "frost-lance"]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("name:            Frost Lance"));
    assert!(stdout.contains("A lance of ice."));

    let (_, stderr, success) = run_grim(&config_path, &["get", "spell", "wish"]);
    assert!(!success);
    assert!(stderr.contains("spell not found: wish"));
}

#[test]
fn test_documents_lists_every_source() {
    let (_tmp, config_path) = seeded_env();

    let (stdout, _, success) = run_grim(&config_path, &["documents", "--json"]);
    assert!(success);
    let documents: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let documents = documents.as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["document_key"], "frozen-north");
    assert_eq!(documents[0]["entity_count"], 3);
    assert_eq!(documents[1]["document_key"], "srd-2014");
    assert_eq!(documents[1]["source"], "api-primary");
}

#[test]
fn test_documents_empty_cache() {
    let (_tmp, config_path) = setup_test_env();
    run_grim(&config_path, &["init"]);
    let (stdout, _, success) = run_grim(&config_path, &["documents"]);
    assert!(success);
    assert!(stdout.contains("No documents cached."));
}

#[test]
fn test_purge_and_stats() {
    let (_tmp, config_path) = seeded_env();

    let (stdout, _, success) = run_grim(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Entities:    5"));
    assert!(stdout.contains("Recent imports:"));

    let (stdout, _, success) = run_grim(&config_path, &["purge", "spell"]);
    assert!(success);
    assert!(stdout.contains("removed: 4"));

    let (stdout, _, _) = run_grim(&config_path, &["search", "spell"]);
    assert!(stdout.contains("No results."));
    let (stdout, _, _) = run_grim(&config_path, &["search", "creature"]);
    assert!(stdout.contains("Ice Troll"));
}
