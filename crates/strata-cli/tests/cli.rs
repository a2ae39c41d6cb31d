//! End-to-end tests for the `strata` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use strata_bundler::Manifest;
use tempfile::TempDir;

const GRAPH: &str = r#"{
    "entries": { "A": "src/a.js", "B": "src/b.js" },
    "modules": [
        { "id": "src/a.js", "dependencies": ["src/c.js"] },
        { "id": "src/b.js", "dependencies": ["src/c.js"] },
        { "id": "src/c.js" }
    ]
}"#;

/// Two entries sharing `src/c.js`, with a strata.toml keeping the cache in
/// the project.
fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/a.js"), "require('./c.js'); console.log('a');").unwrap();
    fs::write(root.join("src/b.js"), "require('./c.js'); console.log('b');").unwrap();
    fs::write(root.join("src/c.js"), "module.exports = 42;").unwrap();
    fs::write(root.join("strata-graph.json"), GRAPH).unwrap();
    fs::write(
        root.join("strata.toml"),
        "graph = \"strata-graph.json\"\nout_dir = \"dist\"\n\n[cache]\ndir = \"cache\"\n",
    )
    .unwrap();
    temp
}

fn strata(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_strata"));
    cmd.current_dir(cwd)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("STRATA_MODE")
        .env_remove("STRATA_FORCE_REBUILD");
    cmd
}

fn dist_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = fs::read_dir(root.join("dist"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    files
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    strata(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn development_build_prints_manifest() {
    let temp = project();
    let output = strata(temp.path())
        .args(["build", "--mode", "dev"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let manifest = Manifest::from_json(&output).unwrap();
    assert_eq!(manifest.entries.len(), 2);
    assert_eq!(manifest.entries["A"].len(), 2);
    assert!(!temp.path().join("dist").exists());
}

#[test]
fn production_build_publishes_output() {
    let temp = project();
    strata(temp.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Published"));

    let files = dist_files(temp.path());
    assert!(files.contains(&"manifest.json".to_string()));
    assert_eq!(files.iter().filter(|f| f.starts_with("entry-")).count(), 2);
    assert_eq!(files.iter().filter(|f| f.starts_with("shared-")).count(), 1);
    assert_eq!(files.iter().filter(|f| f.starts_with("runtime-")).count(), 1);

    let manifest = Manifest::from_json(&fs::read(temp.path().join("dist/manifest.json")).unwrap()).unwrap();
    for file in manifest.files_for_entry("A").unwrap() {
        assert!(files.contains(&file.to_string()), "{file} missing from dist");
    }
}

#[test]
fn second_build_is_served_from_cache() {
    let temp = project();
    strata(temp.path()).arg("build").assert().success();
    strata(temp.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("3 cached, 0 rebuilt"));
}

#[test]
fn force_ignores_the_cache() {
    let temp = project();
    strata(temp.path()).arg("build").assert().success();
    strata(temp.path())
        .args(["build", "--force"])
        .assert()
        .success()
        .stderr(predicate::str::contains("0 cached, 3 rebuilt"));
}

#[test]
fn missing_graph_file_fails() {
    let temp = TempDir::new().unwrap();
    strata(temp.path())
        .args(["build", "--graph", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.json"));
}

#[test]
fn strict_orphans_fail_without_touching_dist() {
    let temp = project();
    let root = temp.path();
    fs::write(
        root.join("strata-graph.json"),
        GRAPH.replace(
            r#"{ "id": "src/c.js" }"#,
            r#"{ "id": "src/c.js" },
        { "id": "src/unused.js", "source": "dead();" }"#,
        ),
    )
    .unwrap();
    fs::write(
        root.join("strata.toml"),
        "orphans = \"error\"\n\n[cache]\ndir = \"cache\"\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("dist")).unwrap();
    fs::write(root.join("dist/old.js"), "old").unwrap();

    strata(root)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("src/unused.js"));

    assert_eq!(dist_files(root), vec!["old.js".to_string()]);
}

#[test]
fn invalid_config_value_is_reported() {
    let temp = project();
    fs::write(temp.path().join("strata.toml"), "hash_length = 99\n").unwrap();
    strata(temp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("hash_length"));
}

#[test]
fn cache_stats_and_clear() {
    let temp = project();
    let root = temp.path();

    strata(root)
        .args(["cache", "stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exists\": false"));

    strata(root).arg("build").assert().success();

    let output = strata(root)
        .args(["cache", "stats", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["exists"], true);
    assert_eq!(report["records"], 3);
    assert_eq!(report["last_build"], 3);

    strata(root)
        .args(["cache", "prune"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Pruned 0"));

    strata(root).args(["cache", "clear"]).assert().success();
    assert!(!root.join("cache/cache.redb").exists());
}

#[test]
fn out_dir_holding_the_project_is_refused() {
    let temp = project();
    let root = temp.path();
    strata(root)
        .args(["build", "--out-dir", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out_dir"));

    assert!(root.join("strata-graph.json").is_file());
    assert!(root.join("src/a.js").is_file());
}
