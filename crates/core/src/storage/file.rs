use std::{
    fs,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{Collection, CollectionStore, Record};
use crate::{
    error::StorageError,
    manifest::{self, CollectionManifest},
};

/// Collection stored as a pretty-printed JSON array on disk.
///
/// The id sequence is kept in a sidecar manifest so the array itself keeps
/// the plain layout other tools already read. The manifest is advisory: the
/// collection file is the record of truth, and a manifest that cannot be read
/// or written only costs the sequence, never the data.
#[derive(Debug)]
pub struct JsonFileStore<R> {
    path: PathBuf,
    manifest_path: PathBuf,
    atomic: bool,
    sequence: bool,
    _records: PhantomData<fn() -> R>,
}

impl<R: Record> JsonFileStore<R> {
    /// Bind to `path`, creating it as an empty collection if it is missing.
    ///
    /// With `atomic` set, saves go through a temporary file that is renamed
    /// over the target.
    pub fn open(path: impl Into<PathBuf>, atomic: bool) -> Result<Self, StorageError> {
        let path = path.into();
        let store = Self {
            manifest_path: manifest::manifest_path(&path),
            path,
            atomic,
            sequence: true,
            _records: PhantomData,
        };
        store.bootstrap()?;
        Ok(store)
    }

    /// Keep the id sequence manifest next to the collection. On by default;
    /// `len + 1` numbering has no sequence to keep.
    pub fn with_sequence(mut self, enabled: bool) -> Self {
        self.sequence = enabled;
        self
    }

    fn bootstrap(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = parent_dir(&self.path) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        info!(kind = %R::KIND, path = %self.path.display(), "Creating empty collection");
        write_file(&self.path, b"[]", self.atomic)
    }

    fn read_manifest_next_id(&self) -> u32 {
        if !self.sequence {
            return 1;
        }
        match CollectionManifest::load(&self.manifest_path) {
            Ok(Some(manifest)) => manifest.next_id,
            Ok(None) => 1,
            Err(err) => {
                warn!("Ignoring unreadable manifest {}: {err}", self.manifest_path.display());
                1
            }
        }
    }
}

impl<R: Record> CollectionStore<R> for JsonFileStore<R> {
    fn load(&self) -> Result<Collection<R>, StorageError> {
        let content = fs::read_to_string(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;
        let records: Vec<R> =
            serde_json::from_str(&content).map_err(|source| StorageError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!(kind = %R::KIND, count = records.len(), "Loaded {}", self.path.display());
        Ok(Collection::new(records, self.read_manifest_next_id()))
    }

    fn save(&self, collection: &Collection<R>) -> Result<(), StorageError> {
        let encoded = encode_indented(collection.records()).map_err(|source| {
            StorageError::Encode {
                path: self.path.clone(),
                source,
            }
        })?;
        write_file(&self.path, &encoded, self.atomic)?;
        if self.sequence {
            let manifest = CollectionManifest::new(collection.next_id());
            if let Err(err) = manifest.persist(&self.manifest_path, self.atomic) {
                warn!(kind = %R::KIND, "Saved {} without its id sequence: {err}", self.path.display());
            }
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Encode with four-space indentation, the layout of the existing files.
fn encode_indented<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Overwrite `path` with `bytes`, optionally through a rename.
///
/// A renamed-over file keeps the permissions of the file it replaces.
pub(crate) fn write_file(path: &Path, bytes: &[u8], atomic: bool) -> Result<(), StorageError> {
    let write_error = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    if !atomic {
        return fs::write(path, bytes).map_err(write_error);
    }

    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(bytes).map_err(write_error)?;
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(write_error)?;
    }
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path)
        .map_err(|err| write_error(err.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Customer, Hotel},
        storage::{IdStrategy, Repository},
    };
    use anyhow::Result;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_collection() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("hoteles.json");
        let store = JsonFileStore::<Hotel>::open(&path, true)?;
        assert_eq!(fs::read_to_string(&path)?, "[]");
        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn open_keeps_existing_data() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clientes.json");
        fs::write(&path, r#"[{"id": 3, "nombre": "Dante", "edad": 31}]"#)?;
        let store = JsonFileStore::<Customer>::open(&path, false)?;
        let collection = store.load()?;
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.next_id(), 4);
        Ok(())
    }

    #[test]
    fn invalid_content_is_a_storage_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("hoteles.json");
        fs::write(&path, "[{\"id\": 1, \"nombre\": ")?;
        let store = JsonFileStore::<Hotel>::open(&path, true)?;
        assert!(matches!(store.load(), Err(StorageError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn vanished_file_is_a_storage_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("hoteles.json");
        let store = JsonFileStore::<Hotel>::open(&path, true)?;
        fs::remove_file(&path)?;
        assert!(matches!(store.load(), Err(StorageError::Read { .. })));
        Ok(())
    }

    #[test]
    fn saves_with_four_space_indent() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("hoteles.json");
        let repo = Repository::new(JsonFileStore::<Hotel>::open(&path, true)?, IdStrategy::Sequence);
        repo.insert_with(|id| Hotel::new(id, "Grand Hotel Budapest", 200))?;

        let raw = fs::read_to_string(&path)?;
        assert!(raw.contains("\n    {\n        \"id\": 1,"));
        let value: Value = serde_json::from_str(&raw)?;
        assert_eq!(
            value,
            json!([{
                "id": 1,
                "nombre": "Grand Hotel Budapest",
                "habitaciones": 200,
                "reservas": []
            }])
        );
        Ok(())
    }

    #[test]
    fn atomic_save_leaves_no_temporary_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clientes.json");
        let repo = Repository::new(JsonFileStore::<Customer>::open(&path, true)?, IdStrategy::Sequence);
        repo.insert_with(|id| Customer { id, name: "Dante".into(), age: 31 })?;
        repo.insert_with(|id| Customer { id, name: "Bruno".into(), age: 29 })?;

        let mut names: Vec<String> = fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["clientes.json", "clientes.manifest.json"]);
        Ok(())
    }

    #[test]
    fn sequence_survives_reopen_and_deletion() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clientes.json");
        let repo = Repository::new(JsonFileStore::<Customer>::open(&path, true)?, IdStrategy::Sequence);
        repo.insert_with(|id| Customer { id, name: "A".into(), age: 20 })?;
        repo.insert_with(|id| Customer { id, name: "B".into(), age: 21 })?;
        repo.remove(2)?;

        let reopened =
            Repository::new(JsonFileStore::<Customer>::open(&path, true)?, IdStrategy::Sequence);
        let created = reopened.insert_with(|id| Customer { id, name: "C".into(), age: 22 })?;
        assert_eq!(created.id, 3);
        Ok(())
    }

    #[test]
    fn corrupt_manifest_falls_back_to_stored_ids() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clientes.json");
        fs::write(&path, r#"[{"id": 5, "nombre": "E", "edad": 50}]"#)?;
        fs::write(manifest::manifest_path(&path), "not json")?;
        let store = JsonFileStore::<Customer>::open(&path, true)?;
        assert_eq!(store.load()?.next_id(), 6);
        Ok(())
    }

    #[test]
    fn unwritable_manifest_does_not_fail_the_save() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reservaciones.json");
        fs::create_dir(manifest::manifest_path(&path))?;
        let repo = Repository::new(JsonFileStore::<Customer>::open(&path, false)?, IdStrategy::Sequence);

        let created = repo.insert_with(|id| Customer { id, name: "Dante".into(), age: 31 })?;
        assert_eq!(created.id, 1);
        let stored: Vec<Customer> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(stored, vec![created]);
        Ok(())
    }

    #[test]
    fn count_plus_one_keeps_no_manifest() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clientes.json");
        let store = JsonFileStore::<Customer>::open(&path, true)?.with_sequence(false);
        let repo = Repository::new(store, IdStrategy::CountPlusOne);
        repo.insert_with(|id| Customer { id, name: "A".into(), age: 20 })?;

        assert!(path.exists());
        assert!(!manifest::manifest_path(&path).exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn atomic_save_keeps_file_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        let path = dir.path().join("hoteles.json");
        let repo = Repository::new(JsonFileStore::<Hotel>::open(&path, true)?, IdStrategy::Sequence);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        repo.insert_with(|id| Hotel::new(id, "Budapest", 3))?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o644);
        Ok(())
    }
}
