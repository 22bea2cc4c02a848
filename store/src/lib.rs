//! Persistent discovery store.
//!
//! Discoveries live in a single JSON array of [`DiscoveryRecord`]s:
//!
//! ```json
//! [
//!   { "name": "Water", "emoji": "💧", "is_first_discovery": false },
//!   { "name": "Steam", "emoji": "💨", "is_first_discovery": true }
//! ]
//! ```
//!
//! The store is append-only with dedup-by-name: the first record for a name
//! wins and later appends of the same name are a no-op. Every successful append
//! rewrites the whole file atomically; discovery counts are in the hundreds, so
//! streaming is not worth the complexity.
//!
//! A store assumes exclusive ownership of its file for the life of the process.
//! Appends within the process are serialized so concurrent pairings cannot lose
//! each other's records.

mod error;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use craft_types::{DiscoveryRecord, starting_discoveries};
use craft_utils::atomic_write;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

pub use error::{Result, StoreError};

/// Default JSON indentation width.
pub const DEFAULT_INDENT: usize = 2;

/// Upper bound on the indentation width accepted from configuration.
pub const MAX_INDENT: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Spaces per JSON nesting level. `0` writes compact JSON.
    pub indent: usize,
    /// Whether `reset` may create the file and its parent directories.
    pub make_file: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            make_file: true,
        }
    }
}

/// Result of inspecting the store path before touching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    /// A writable file is already there.
    Present,
    /// Nothing there yet, but it can be created.
    Missing,
}

#[derive(Debug)]
pub struct DiscoveryStore {
    path: PathBuf,
    options: StoreOptions,
    write_lock: Mutex<()>,
}

impl DiscoveryStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options: StoreOptions {
                indent: options.indent.min(MAX_INDENT),
                ..options
            },
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Check that the path is usable as a discoveries file.
    ///
    /// Fails when the path exists but is not a writable file, or when its parent
    /// exists but is not a directory.
    pub fn check_path(&self) -> Result<PathStatus> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => {
                if meta.permissions().readonly() {
                    Err(StoreError::ReadOnly {
                        path: self.path.clone(),
                    })
                } else {
                    Ok(PathStatus::Present)
                }
            }
            Ok(_) => Err(StoreError::NotAFile {
                path: self.path.clone(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = non_empty_parent(&self.path)
                    && let Ok(meta) = fs::metadata(parent)
                    && !meta.is_dir()
                {
                    return Err(StoreError::NotADirectory {
                        path: parent.to_path_buf(),
                    });
                }
                Ok(PathStatus::Missing)
            }
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Read every record, in discovery order.
    pub fn load(&self) -> Result<Vec<DiscoveryRecord>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                StoreError::io(&self.path, e)
            }
        })?;

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Records for which `keep` returns true, in discovery order.
    pub fn load_where(
        &self,
        keep: impl Fn(&DiscoveryRecord) -> bool,
    ) -> Result<Vec<DiscoveryRecord>> {
        Ok(self.load()?.into_iter().filter(|r| keep(r)).collect())
    }

    /// The stored record with this name, read straight from the file.
    pub fn find(&self, name: &str) -> Result<Option<DiscoveryRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.name == name))
    }

    /// Read every record and hand them to `observe` while appends are held off,
    /// so whatever `observe` mirrors cannot be overtaken by an older snapshot.
    pub fn load_with(&self, observe: impl FnOnce(&[DiscoveryRecord])) -> Result<()> {
        let _guard = self.lock_writes();
        observe(&self.load()?);
        Ok(())
    }

    /// Append `record` unless its name is already stored.
    ///
    /// Returns the updated sequence, or `None` when the name was already present
    /// (nothing is written in that case).
    pub fn append_if_absent(
        &self,
        record: DiscoveryRecord,
    ) -> Result<Option<Vec<DiscoveryRecord>>> {
        let mut updated = None;
        let appended = self.append_if_absent_with(record, |records| {
            updated = Some(records.to_vec());
        })?;
        Ok(updated.filter(|_| appended))
    }

    /// Append `record` unless its name is already stored, then hand the file's
    /// current contents to `observe` before the next append can start.
    ///
    /// Returns whether the record was written.
    pub fn append_if_absent_with(
        &self,
        record: DiscoveryRecord,
        observe: impl FnOnce(&[DiscoveryRecord]),
    ) -> Result<bool> {
        let _guard = self.lock_writes();

        let mut records = self.load()?;
        if records.iter().any(|r| r.name == record.name) {
            tracing::debug!(name = %record.name, "Discovery already stored; skipping write");
            observe(&records);
            return Ok(false);
        }

        tracing::debug!(name = %record.name, "Storing new discovery");
        records.push(record);
        self.write(&records)?;
        observe(&records);
        Ok(true)
    }

    /// Overwrite the file with the four starting discoveries.
    pub fn reset(&self) -> Result<()> {
        self.reset_with(&starting_discoveries())
    }

    /// Overwrite the file with `seed`.
    ///
    /// Creates missing parent directories and the file itself when file creation
    /// is allowed; otherwise a missing file is [`StoreError::NotFound`].
    pub fn reset_with(&self, seed: &[DiscoveryRecord]) -> Result<()> {
        let _guard = self.lock_writes();

        if self.check_path()? == PathStatus::Missing {
            if !self.options.make_file {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            if let Some(parent) = non_empty_parent(&self.path) {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        self.write(seed)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, records: &[DiscoveryRecord]) -> Result<()> {
        let bytes = encode(records, self.options.indent)?;
        atomic_write(&self.path, &bytes).map_err(|e| StoreError::io(&self.path, e))
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn encode(records: &[DiscoveryRecord], indent: usize) -> Result<Vec<u8>> {
    if indent == 0 {
        return serde_json::to_vec(records).map_err(StoreError::Serialize);
    }

    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut ser).map_err(StoreError::Serialize)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, options: StoreOptions) -> DiscoveryStore {
        DiscoveryStore::new(dir.path().join("discoveries.json"), options)
    }

    #[test]
    fn reset_then_load_returns_seed_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());

        store.reset().expect("reset");
        assert_eq!(store.load().expect("load"), starting_discoveries());
    }

    #[test]
    fn reset_without_make_file_requires_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(
            &dir,
            StoreOptions {
                make_file: false,
                ..StoreOptions::default()
            },
        );

        let err = store.reset().expect_err("missing file");
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!store.path().exists());
    }

    #[test]
    fn reset_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DiscoveryStore::new(
            dir.path().join("nested").join("deeper").join("d.json"),
            StoreOptions::default(),
        );

        store.reset().expect("reset");
        assert_eq!(store.load().expect("load").len(), 4);
    }

    #[test]
    fn append_is_idempotent_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        store.reset().expect("reset");

        let first = store
            .append_if_absent(DiscoveryRecord::new("Steam", Some("💨"), true))
            .expect("append");
        assert_eq!(first.map(|r| r.len()), Some(5));

        let second = store
            .append_if_absent(DiscoveryRecord::new("Steam", Some("☁️"), false))
            .expect("append again");
        assert!(second.is_none());

        let steam: Vec<_> = store
            .load_where(|r| r.name == "Steam")
            .expect("load_where");
        assert_eq!(steam, vec![DiscoveryRecord::new("Steam", Some("💨"), true)]);
    }

    #[test]
    fn append_preserves_discovery_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        store.reset().expect("reset");

        for name in ["Steam", "Lava", "Dust"] {
            store
                .append_if_absent(DiscoveryRecord::new(name, None, false))
                .expect("append");
        }

        let names: Vec<_> = store.load().expect("load").into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["Water", "Fire", "Wind", "Earth", "Steam", "Lava", "Dust"]);
    }

    #[test]
    fn observer_sees_contents_in_write_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        store.reset().expect("reset");
        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for i in 0..16 {
                let (store, seen) = (&store, &seen);
                scope.spawn(move || {
                    // Half the names collide, so both branches run concurrently.
                    let record = DiscoveryRecord::new(format!("Element {}", i % 8), None, false);
                    store
                        .append_if_absent_with(record, |records| {
                            seen.lock().expect("seen").push(records.len());
                        })
                        .expect("append");
                });
            }
        });

        let seen = seen.into_inner().expect("seen");
        assert_eq!(seen.len(), 16);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last(), Some(&store.load().expect("load").len()));
        assert_eq!(store.load().expect("load").len(), 12);
    }

    #[test]
    fn load_with_observes_current_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        store.reset().expect("reset");

        let mut names = Vec::new();
        store
            .load_with(|records| names.extend(records.iter().map(|r| r.name.clone())))
            .expect("load_with");
        assert_eq!(names, ["Water", "Fire", "Wind", "Earth"]);
    }

    #[test]
    fn malformed_file_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        fs::write(store.path(), "{ not json").expect("write");

        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
        assert!(matches!(
            store.append_if_absent(DiscoveryRecord::new("Steam", None, false)),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn wrong_json_shape_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        fs::write(store.path(), r#"{"name":"Water"}"#).expect("write");

        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        assert!(matches!(store.load(), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn directory_path_is_not_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DiscoveryStore::new(dir.path(), StoreOptions::default());
        assert!(matches!(store.check_path(), Err(StoreError::NotAFile { .. })));
    }

    #[test]
    fn file_parent_is_not_a_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").expect("write");
        let store = DiscoveryStore::new(blocker.join("d.json"), StoreOptions::default());
        assert!(matches!(
            store.check_path(),
            Err(StoreError::NotADirectory { .. })
        ));
    }

    #[test]
    fn check_path_reports_presence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        assert_eq!(store.check_path().expect("check"), PathStatus::Missing);
        store.reset().expect("reset");
        assert_eq!(store.check_path().expect("check"), PathStatus::Present);
    }

    #[test]
    fn indent_controls_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(
            &dir,
            StoreOptions {
                indent: 4,
                ..StoreOptions::default()
            },
        );
        store.reset().expect("reset");
        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(raw.starts_with("[\n    {\n        \"name\": \"Water\""));

        let compact = DiscoveryStore::new(
            dir.path().join("compact.json"),
            StoreOptions {
                indent: 0,
                ..StoreOptions::default()
            },
        );
        compact.reset().expect("reset");
        let raw = fs::read_to_string(compact.path()).expect("read");
        assert!(!raw.contains('\n'));
    }

    #[test]
    fn find_reads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir, StoreOptions::default());
        store.reset().expect("reset");

        let fire = store.find("Fire").expect("find").expect("seeded");
        assert_eq!(fire.emoji.as_deref(), Some("🔥"));
        assert!(store.find("Steam").expect("find").is_none());
    }
}
