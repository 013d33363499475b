//! Integration tests for the build/hit/stale lifecycle of cache entries.
//!
//! Every test drives the public `ArtifactCache` API against a temporary
//! directory and manipulates dependency files and cache files directly to
//! simulate edits, deletions and interrupted writes.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_cache::{
    ArtifactCache, CacheError, CacheOutcome, DependencyManifest, GenerationResult,
};
use kiln_common::Timestamp;
use serde::Serialize;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ContainerRequest {
    config: BTreeMap<String, String>,
    config_files: Vec<PathBuf>,
    class: String,
}

fn container_request(config_file: &Path) -> ContainerRequest {
    ContainerRequest {
        config: BTreeMap::from([("db.dsn".to_string(), "sqlite::memory:".to_string())]),
        config_files: vec![config_file.to_path_buf()],
        class: "SystemContainer".to_string(),
    }
}

fn write_with_mtime(path: &Path, content: &str, secs: i64) {
    std::fs::write(path, content).unwrap();
    set_mtime(path, secs);
}

fn set_mtime(path: &Path, secs: i64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(Timestamp::from_secs(secs).to_system_time())
        .unwrap();
}

/// A generator that counts its invocations and depends on `deps`.
struct CountingGenerator {
    calls: Cell<usize>,
    deps: Vec<PathBuf>,
}

impl CountingGenerator {
    fn new(deps: &[&Path]) -> Self {
        Self {
            calls: Cell::new(0),
            deps: deps.iter().map(|p| p.to_path_buf()).collect(),
        }
    }

    fn generate(&self) -> Result<GenerationResult, CacheError> {
        self.calls.set(self.calls.get() + 1);
        let code = format!("// build {}\nclass SystemContainer {{}}\n", self.calls.get());
        Ok(GenerationResult::new(code, self.deps.clone()))
    }

    fn calls(&self) -> usize {
        self.calls.get()
    }
}

fn setup() -> (TempDir, ArtifactCache, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::new(&dir.path().join("cache"));
    let conf = dir.path().join("app.conf");
    write_with_mtime(&conf, "db.dsn = sqlite::memory:", 1_000_000);
    (dir, cache, conf)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn concrete_scenario_build_touch_rebuild_hit() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    // First call builds A1 with manifest {app.conf: T0}.
    let a1 = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(a1.outcome(), CacheOutcome::Built);
    let entry = cache.entry_paths(&request).unwrap();
    let manifest = DependencyManifest::load(&entry.manifest).unwrap();
    assert_eq!(
        manifest.recorded(&conf),
        Some(Some(Timestamp::from_secs(1_000_000)))
    );

    // Touch app.conf to T1: second call builds A2 with manifest {app.conf: T1}.
    set_mtime(&conf, 1_000_060);
    let a2 = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(a2.outcome(), CacheOutcome::Built);
    assert_eq!(generator.calls(), 2);
    let manifest = DependencyManifest::load(&entry.manifest).unwrap();
    assert_eq!(
        manifest.recorded(&conf),
        Some(Some(Timestamp::from_secs(1_000_060)))
    );

    // Third call returns A2 without invoking the generator.
    let a3 = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert!(a3.is_hit());
    assert_eq!(generator.calls(), 2);
    assert_eq!(a3.content(), a2.content());
}

#[test]
fn hit_after_build_returns_identical_bytes() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    let first = cache.get_or_build(&request, || generator.generate()).unwrap();
    let second = cache.get_or_build(&request, || generator.generate()).unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(first.content(), second.content());
    assert_eq!(std::fs::read(second.path()).unwrap(), first.content());
}

#[test]
fn hit_survives_a_fresh_cache_instance() {
    let (dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);
    cache.get_or_build(&request, || generator.generate()).unwrap();

    let reopened = ArtifactCache::new(&dir.path().join("cache"));
    let handle = reopened
        .get_or_build(&request, || generator.generate())
        .unwrap();
    assert!(handle.is_hit());
    assert_eq!(generator.calls(), 1);
}

#[test]
fn reverting_to_older_mtime_triggers_rebuild() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    cache.get_or_build(&request, || generator.generate()).unwrap();
    set_mtime(&conf, 999_000);
    let handle = cache.get_or_build(&request, || generator.generate()).unwrap();

    assert_eq!(handle.outcome(), CacheOutcome::Built);
    assert_eq!(generator.calls(), 2);
}

#[test]
fn only_one_of_many_dependencies_changing_triggers_rebuild() {
    let (dir, cache, conf) = setup();
    let services = dir.path().join("services.conf");
    write_with_mtime(&services, "services:", 2_000_000);
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf, &services]);

    cache.get_or_build(&request, || generator.generate()).unwrap();
    set_mtime(&services, 2_000_001);
    cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(generator.calls(), 2);
}

#[test]
fn deleted_dependency_triggers_rebuild_not_error() {
    let (dir, cache, conf) = setup();
    let extra = dir.path().join("extra.conf");
    write_with_mtime(&extra, "extra", 1_500_000);
    let request = container_request(&conf);
    let with_extra = CountingGenerator::new(&[&conf, &extra]);

    cache.get_or_build(&request, || with_extra.generate()).unwrap();
    std::fs::remove_file(&extra).unwrap();

    let handle = cache
        .get_or_build(&request, || with_extra.generate())
        .unwrap();
    assert_eq!(handle.outcome(), CacheOutcome::Built);
    assert_eq!(with_extra.calls(), 2);
}

#[test]
fn dependency_missing_at_generation_never_verifies() {
    let (dir, cache, conf) = setup();
    let missing = dir.path().join("optional.conf");
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf, &missing]);

    cache.get_or_build(&request, || generator.generate()).unwrap();
    let entry = cache.entry_paths(&request).unwrap();
    let manifest = DependencyManifest::load(&entry.manifest).unwrap();
    assert_eq!(manifest.recorded(&missing), Some(None));

    cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(generator.calls(), 2);
}

// ---------------------------------------------------------------------------
// Missing or broken manifests
// ---------------------------------------------------------------------------

#[test]
fn artifact_without_manifest_is_a_miss() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    let entry = cache.entry_paths(&request).unwrap();
    std::fs::create_dir_all(entry.artifact.parent().unwrap()).unwrap();
    std::fs::write(&entry.artifact, "planted artifact").unwrap();

    let handle = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(handle.outcome(), CacheOutcome::Built);
    assert_ne!(handle.content(), b"planted artifact");
    assert!(entry.manifest.exists());
}

#[test]
fn corrupt_manifest_is_a_miss() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    cache.get_or_build(&request, || generator.generate()).unwrap();
    let entry = cache.entry_paths(&request).unwrap();
    std::fs::write(&entry.manifest, "{\"format_version\": 1, \"dependen").unwrap();

    let handle = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(handle.outcome(), CacheOutcome::Built);
    assert!(DependencyManifest::load(&entry.manifest).is_some());
}

#[test]
fn interrupted_publish_is_never_a_false_hit() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);
    cache.get_or_build(&request, || generator.generate()).unwrap();

    // Simulate a crash after the new artifact was renamed into place but
    // before its manifest was published: the old manifest is already gone.
    let entry = cache.entry_paths(&request).unwrap();
    std::fs::remove_file(&entry.manifest).unwrap();
    std::fs::write(&entry.artifact, "half-published artifact").unwrap();

    assert!(cache.lookup(&request).unwrap().is_none());
    let handle = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(handle.outcome(), CacheOutcome::Built);
    assert_eq!(generator.calls(), 2);
}

#[test]
fn failed_persist_surfaces_error_and_leaves_no_hit() {
    let (_dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    // A non-empty directory on the manifest path makes publishing fail.
    let entry = cache.entry_paths(&request).unwrap();
    std::fs::create_dir_all(&entry.manifest).unwrap();
    std::fs::write(entry.manifest.join("blocker"), "x").unwrap();

    let err = cache
        .get_or_build(&request, || generator.generate())
        .unwrap_err();
    assert!(matches!(err, CacheError::Io { .. }));
    assert!(cache.lookup(&request).unwrap().is_none());

    std::fs::remove_dir_all(&entry.manifest).unwrap();
    let handle = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(handle.outcome(), CacheOutcome::Built);
    assert_eq!(generator.calls(), 2);
}

#[test]
fn no_temporary_files_left_after_builds() {
    let (dir, cache, conf) = setup();
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf]);

    cache.get_or_build(&request, || generator.generate()).unwrap();
    set_mtime(&conf, 1_000_500);
    cache.get_or_build(&request, || generator.generate()).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("cache"))
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[cfg(unix)]
#[test]
fn non_utf8_dependency_still_yields_hits() {
    use std::os::unix::ffi::OsStrExt;

    let (dir, cache, conf) = setup();
    let odd = dir.path().join(std::ffi::OsStr::from_bytes(b"services-\xff.conf"));
    write_with_mtime(&odd, "services", 1_000_000);
    let request = container_request(&conf);
    let generator = CountingGenerator::new(&[&conf, &odd]);

    let built = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(built.outcome(), CacheOutcome::Built);
    assert!(cache.get_or_build(&request, || generator.generate()).unwrap().is_hit());
    assert_eq!(generator.calls(), 1);

    set_mtime(&odd, 1_000_100);
    let rebuilt = cache.get_or_build(&request, || generator.generate()).unwrap();
    assert_eq!(rebuilt.outcome(), CacheOutcome::Built);
    assert_eq!(generator.calls(), 2);
}
