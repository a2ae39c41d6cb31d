//! Layered loading: overrides > environment > strata.toml > defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use strata_bundler::{BuildMode, OrphanPolicy};
use strata_config::{CacheOverrides, ConfigError, ConfigOverrides, ProjectConfig};
use tempfile::TempDir;

const SAMPLE: &str = r#"
mode = "development"
out_dir = "public/build"
hash_length = 12
shared = ["lib/react.js"]
orphans = "error"

[entries]
main = "src/main.js"

[cache]
dir = "tmp/cache"
max_entries = 500

[manifest]
file_name = "assets.json"
metadata = { release = "2024.06" }
"#;

fn project_with(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("strata.toml"), config).unwrap();
    dir
}

struct EnvGuard(&'static str);

impl EnvGuard {
    fn set(key: &'static str, value: &str) -> Self {
        // SAFETY: tests touching the environment are #[serial].
        unsafe { std::env::set_var(key, value) };
        Self(key)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        unsafe { std::env::remove_var(self.0) };
    }
}

#[test]
#[serial]
fn file_values_override_defaults() {
    let dir = project_with(SAMPLE);
    let project = ProjectConfig::load(dir.path(), None, &ConfigOverrides::default()).unwrap();

    assert_eq!(project.root, dir.path());
    assert_eq!(project.file, Some(dir.path().join("strata.toml")));

    let config = &project.config;
    assert_eq!(config.mode, BuildMode::Development);
    assert_eq!(config.hash_length, 12);
    assert_eq!(config.orphans, OrphanPolicy::Error);
    assert_eq!(config.entries["main"], "src/main.js");
    assert_eq!(config.cache.max_entries, Some(500));
    assert_eq!(config.manifest.file_name, "assets.json");
    assert_eq!(config.manifest.metadata["release"], "2024.06");
    // Untouched keys keep their defaults.
    assert_eq!(config.graph, PathBuf::from("strata-graph.json"));
    assert!(config.cache.enabled);

    assert_eq!(project.out_dir(), dir.path().join("public/build"));
    assert_eq!(project.cache_dir(), dir.path().join("tmp/cache"));
}

#[test]
#[serial]
fn discovery_from_a_subdirectory() {
    let dir = project_with(SAMPLE);
    let nested = dir.path().join("src/pages");
    fs::create_dir_all(&nested).unwrap();

    let project = ProjectConfig::load(&nested, None, &ConfigOverrides::default()).unwrap();
    assert_eq!(project.root, dir.path());
    assert_eq!(project.graph_path(), dir.path().join("strata-graph.json"));
}

#[test]
#[serial]
fn defaults_without_a_file() {
    let dir = TempDir::new().unwrap();
    let project = ProjectConfig::from_overrides(dir.path(), &ConfigOverrides::default()).unwrap();

    assert_eq!(project.config.mode, BuildMode::Production);
    assert_eq!(project.out_dir(), dir.path().join("dist"));
    assert!(project.file.is_none());
}

#[test]
#[serial]
fn environment_overrides_file() {
    let dir = project_with(SAMPLE);
    let _mode = EnvGuard::set("STRATA_MODE", "production");
    let _cache = EnvGuard::set("STRATA_CACHE__DIR", "env-cache");
    let _length = EnvGuard::set("STRATA_HASH_LENGTH", "16");

    let project = ProjectConfig::load(dir.path(), None, &ConfigOverrides::default()).unwrap();

    assert_eq!(project.config.mode, BuildMode::Production);
    assert_eq!(project.config.hash_length, 16);
    assert_eq!(project.cache_dir(), dir.path().join("env-cache"));
    // Sibling keys of an overridden section survive.
    assert_eq!(project.config.cache.max_entries, Some(500));
}

#[test]
#[serial]
fn overrides_beat_environment() {
    let dir = project_with(SAMPLE);
    let _length = EnvGuard::set("STRATA_HASH_LENGTH", "16");

    let overrides = ConfigOverrides {
        hash_length: Some(20),
        out_dir: Some(PathBuf::from("/srv/www")),
        cache: CacheOverrides {
            enabled: Some(false),
            ..CacheOverrides::default()
        },
        ..ConfigOverrides::default()
    };
    let project = ProjectConfig::load(dir.path(), None, &overrides).unwrap();

    assert_eq!(project.config.hash_length, 20);
    assert_eq!(project.out_dir(), Path::new("/srv/www"));
    assert!(!project.config.cache.enabled);
    assert!(project.cache_config().dir.is_none());
    assert_eq!(project.config.mode, BuildMode::Development);
}

#[test]
#[serial]
fn explicit_config_path() {
    let dir = TempDir::new().unwrap();
    let configs = dir.path().join("configs");
    fs::create_dir_all(&configs).unwrap();
    fs::write(configs.join("ci.toml"), "hash_length = 10\n").unwrap();

    let project = ProjectConfig::load(
        dir.path(),
        Some(Path::new("configs/ci.toml")),
        &ConfigOverrides::default(),
    )
    .unwrap();
    assert_eq!(project.config.hash_length, 10);
    assert_eq!(project.root, configs);

    let missing = ProjectConfig::load(
        dir.path(),
        Some(Path::new("nope.toml")),
        &ConfigOverrides::default(),
    )
    .unwrap_err();
    assert!(matches!(missing, ConfigError::NotFound(_)));
}

#[test]
#[serial]
fn invalid_values_are_reported() {
    let dir = project_with("hash_length = 99\n");
    let err = ProjectConfig::load(dir.path(), None, &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "hash_length"));

    let dir = project_with("mode = \"fast\"\n");
    let err = ProjectConfig::load(dir.path(), None, &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Figment(_)));
    assert!(err.hint().is_some());
}

#[test]
#[serial]
fn conversions_feed_the_bundler() {
    let dir = project_with(SAMPLE);
    let project = ProjectConfig::load(dir.path(), None, &ConfigOverrides::default()).unwrap();

    let options = project.build_options();
    assert_eq!(options.mode, BuildMode::Development);
    assert_eq!(options.hash_length, 12);
    assert_eq!(options.manifest_file, "assets.json");
    assert_eq!(options.out_dir, Some(dir.path().join("public/build")));

    let cache = project.cache_config();
    assert_eq!(cache.dir, Some(dir.path().join("tmp/cache")));
    assert_eq!(cache.max_entries, Some(500));
}
