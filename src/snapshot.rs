//! Persisted rule-set snapshot.
//!
//! The active [`RuleStore`] is persisted as two JSON files (one per rule
//! kind) holding the original rule lines plus a checksum, and a metadata
//! stamp recording when the snapshot was last refreshed. Loading is
//! best-effort: a missing, corrupt, or checksum-mismatched file yields an
//! empty rule set, never an error to the caller; the remote refresh will
//! repopulate it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::metadata::UpdateMetadata;
use crate::rule::Rule;
use crate::store::RuleStore;

const EXCEPTIONS_FILE: &str = "exceptions.json";
const EXCLUSIONS_FILE: &str = "exclusions.json";
const META_FILE: &str = "snapshot.meta";

/// One persisted rule set: the original lines plus their checksum.
#[derive(Debug, Serialize, Deserialize)]
struct RuleFile {
    checksum: String,
    lines: Vec<String>,
}

/// On-disk snapshot of a [`RuleStore`] under a cache directory.
pub struct Snapshot {
    dir: PathBuf,
}

impl Snapshot {
    /// Create a snapshot handle for a cache directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Load the persisted store, best-effort.
    ///
    /// Each file is validated against its checksum and re-parsed line by
    /// line; any failure is logged and degrades to an empty set for that
    /// kind.
    pub fn load(&self) -> RuleStore {
        let mut store = RuleStore::new();
        self.load_file(EXCEPTIONS_FILE, &mut store);
        self.load_file(EXCLUSIONS_FILE, &mut store);
        store
    }

    fn load_file(&self, file: &str, store: &mut RuleStore) {
        let path = self.dir.join(file);
        if !path.exists() {
            log::debug!("no persisted rules at {:?}", path);
            return;
        }

        let rule_file = match read_rule_file(&path) {
            Ok(rule_file) => rule_file,
            Err(e) => {
                log::warn!("discarding persisted rules {:?}: {}", path, e);
                return;
            }
        };

        for line in &rule_file.lines {
            match Rule::parse(line) {
                Ok(rule) => store.add(rule),
                Err(e) => log::debug!("skipping persisted rule line: {}", e),
            }
        }
    }

    /// Persist the store and stamp the refresh time.
    pub fn save(&self, store: &RuleStore) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let exceptions: Vec<String> = sorted_lines(store.exceptions().map(|r| r.original_line()));
        let exclusions: Vec<String> = sorted_lines(store.exclusions().map(|r| r.original_line()));

        write_rule_file(&self.dir.join(EXCEPTIONS_FILE), exceptions)?;
        write_rule_file(&self.dir.join(EXCLUSIONS_FILE), exclusions)?;

        UpdateMetadata::now().save(self.meta_path())?;
        Ok(())
    }

    /// Check whether the snapshot is older than the refresh threshold.
    ///
    /// A snapshot that has never been stamped is stale.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        let meta = UpdateMetadata::load(self.meta_path()).unwrap_or_default();
        meta.needs_update(threshold)
    }

    /// When the snapshot was last refreshed, if ever.
    pub fn last_updated(&self) -> Option<SystemTime> {
        UpdateMetadata::load(self.meta_path())
            .ok()
            .and_then(|meta| meta.last_updated())
    }
}

fn sorted_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut lines: Vec<String> = lines.map(str::to_string).collect();
    lines.sort_unstable();
    lines
}

fn read_rule_file(path: &Path) -> Result<RuleFile> {
    let content = fs::read_to_string(path)?;
    let rule_file: RuleFile = serde_json::from_str(&content)?;
    if rule_file.checksum != checksum(&rule_file.lines) {
        return Err(Error::ChecksumMismatch);
    }
    Ok(rule_file)
}

/// Write `{checksum, lines}` through a temp file and an atomic rename.
fn write_rule_file(path: &Path, lines: Vec<String>) -> Result<()> {
    let rule_file = RuleFile {
        checksum: checksum(&lines),
        lines,
    };
    let content = serde_json::to_string(&rule_file)?;

    let temp_path = path.with_extension("json.tmp");
    let mut temp_file = fs::File::create(&temp_path)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.sync_all()?;
    drop(temp_file);
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// SHA-256 over the newline-joined rule lines, hex-encoded.
fn checksum(lines: &[String]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_store() -> RuleStore {
        let mut store = RuleStore::new();
        store.add(Rule::parse("||doubleclick.net^").unwrap());
        store.add(Rule::parse("*tracker*").unwrap());
        store.add(Rule::parse("@@||doubleclick.net/safe^").unwrap());
        store
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path());
        snapshot.save(&sample_store()).unwrap();

        let loaded = snapshot.load();
        assert_eq!(loaded.exclusion_count(), 2);
        assert_eq!(loaded.exception_count(), 1);
        assert!(loaded.matches_exclusion("http://doubleclick.net/ad"));
        assert!(loaded.matches_exception("http://doubleclick.net/safe"));
    }

    #[test]
    fn test_load_missing_yields_empty() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path().join("never-written"));
        assert!(snapshot.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_yields_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(EXCLUSIONS_FILE), "not json at all").unwrap();

        let snapshot = Snapshot::new(dir.path());
        assert!(snapshot.load().is_empty());
    }

    #[test]
    fn test_checksum_mismatch_yields_empty() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path());
        snapshot.save(&sample_store()).unwrap();

        // Tamper with the persisted lines without fixing the checksum.
        let path = dir.path().join(EXCLUSIONS_FILE);
        let mut rule_file: RuleFile =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        rule_file.lines.push("||injected.example.com^".to_string());
        fs::write(&path, serde_json::to_string(&rule_file).unwrap()).unwrap();

        let loaded = snapshot.load();
        assert_eq!(loaded.exclusion_count(), 0);
        // The untampered exceptions file still loads.
        assert_eq!(loaded.exception_count(), 1);
    }

    #[test]
    fn test_never_stamped_is_stale() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path());
        assert!(snapshot.is_stale(Duration::from_secs(86400)));
        assert!(snapshot.last_updated().is_none());
    }

    #[test]
    fn test_fresh_stamp_is_not_stale() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path());
        snapshot.save(&sample_store()).unwrap();

        assert!(!snapshot.is_stale(Duration::from_secs(86400)));
        assert!(snapshot.last_updated().is_some());
    }

    #[test]
    fn test_old_stamp_is_stale() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path());
        snapshot.save(&sample_store()).unwrap();

        // Backdate the stamp by two days.
        let meta = UpdateMetadata {
            last_updated: Some(SystemTime::now() - Duration::from_secs(2 * 86400)),
        };
        meta.save(snapshot.meta_path()).unwrap();

        assert!(snapshot.is_stale(Duration::from_secs(86400)));
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path());
        snapshot.save(&sample_store()).unwrap();

        let mut smaller = RuleStore::new();
        smaller.add(Rule::parse("||ads.example.com^").unwrap());
        snapshot.save(&smaller).unwrap();

        let loaded = snapshot.load();
        assert_eq!(loaded.rule_count(), 1);
        assert!(loaded.matches_exclusion("http://ads.example.com/x"));
    }
}
