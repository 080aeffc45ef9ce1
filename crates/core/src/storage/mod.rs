//! Record collections and the backends that persist them.
//!
//! Every manager works the same way: load the whole collection, change it in
//! memory, write the whole collection back. [`Repository`] captures that cycle
//! once so the managers only describe the change itself.

/// JSON file backend.
pub mod file;
/// In-memory backend.
pub mod memory;

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{ManagerError, StorageError},
    models::{RecordId, RecordKind},
};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// A record that lives in one of the persisted collections.
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Collection kind, used in reports.
    const KIND: RecordKind;

    /// Identifier of the record within its collection.
    fn id(&self) -> RecordId;
}

/// How new records are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Persisted counter that only moves forward; ids freed by deletion are
    /// never handed out again.
    #[default]
    Sequence,
    /// `len + 1` numbering, matching files written by older tooling.
    CountPlusOne,
}

/// Ordered records plus the next id of the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R> {
    records: Vec<R>,
    next_id: RecordId,
}

impl<R: Record> Collection<R> {
    /// Build a collection. `next_id` is raised past the largest stored id.
    pub fn new(records: Vec<R>, next_id: RecordId) -> Self {
        let floor = id_floor(&records);
        Self {
            records,
            next_id: next_id.max(floor),
        }
    }

    /// A collection with no records.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 1)
    }

    /// Records in stored order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Consume the collection, returning its records.
    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    /// Next id the sequence would hand out.
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with a matching id.
    pub fn find(&self, id: RecordId) -> Option<&R> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Mutable access to the first record with a matching id.
    pub fn find_mut(&mut self, id: RecordId) -> Option<&mut R> {
        self.records.iter_mut().find(|record| record.id() == id)
    }

    /// Reserve an id for a record about to be pushed.
    pub fn allocate_id(&mut self, strategy: IdStrategy) -> RecordId {
        match strategy {
            IdStrategy::Sequence => {
                let id = self.next_id;
                self.next_id = id.saturating_add(1);
                id
            }
            IdStrategy::CountPlusOne => {
                u32::try_from(self.records.len()).unwrap_or(u32::MAX - 1) + 1
            }
        }
    }

    /// Append a record at the end.
    pub fn push(&mut self, record: R) {
        self.next_id = self.next_id.max(record.id().saturating_add(1));
        self.records.push(record);
    }

    /// Drop every record with the given id. Returns whether any was removed.
    pub fn remove(&mut self, id: RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id() != id);
        self.records.len() != before
    }

    /// Remove and return the first record matching `predicate`.
    pub fn take_first<P>(&mut self, predicate: P) -> Option<R>
    where
        P: Fn(&R) -> bool,
    {
        let index = self.records.iter().position(predicate)?;
        Some(self.records.remove(index))
    }
}

fn id_floor<R: Record>(records: &[R]) -> RecordId {
    records
        .iter()
        .map(|record| record.id().saturating_add(1))
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Backend holding one collection.
pub trait CollectionStore<R: Record>: Send + Sync {
    /// Read the full collection.
    fn load(&self) -> Result<Collection<R>, StorageError>;

    /// Overwrite the stored collection.
    fn save(&self, collection: &Collection<R>) -> Result<(), StorageError>;

    /// Human readable location, for logs.
    fn location(&self) -> String;
}

/// Load-mutate-save helpers over a [`CollectionStore`].
pub struct Repository<R: Record> {
    store: Box<dyn CollectionStore<R>>,
    id_strategy: IdStrategy,
}

impl<R: Record> Repository<R> {
    /// Wrap a backend.
    pub fn new(store: impl CollectionStore<R> + 'static, id_strategy: IdStrategy) -> Self {
        Self {
            store: Box::new(store),
            id_strategy,
        }
    }

    /// All records in stored order.
    pub fn all(&self) -> Result<Vec<R>, StorageError> {
        Ok(self.store.load()?.into_records())
    }

    /// The record with the given id.
    pub fn get(&self, id: RecordId) -> Result<R, ManagerError> {
        self.store
            .load()?
            .find(id)
            .cloned()
            .ok_or_else(|| ManagerError::not_found(R::KIND, id))
    }

    /// Append a record built from a freshly allocated id and persist.
    pub fn insert_with<F>(&self, build: F) -> Result<R, StorageError>
    where
        F: FnOnce(RecordId) -> R,
    {
        let mut collection = self.store.load()?;
        let id = collection.allocate_id(self.id_strategy);
        let record = build(id);
        collection.push(record.clone());
        self.save(&collection)?;
        Ok(record)
    }

    /// Remove a record by id. The collection is written back whether or not
    /// the id existed.
    pub fn remove(&self, id: RecordId) -> Result<bool, StorageError> {
        let mut collection = self.store.load()?;
        let removed = collection.remove(id);
        self.save(&collection)?;
        Ok(removed)
    }

    /// Remove the first record matching `predicate`, persisting only when one
    /// was found.
    pub fn remove_first<P>(&self, predicate: P) -> Result<Option<R>, StorageError>
    where
        P: Fn(&R) -> bool,
    {
        let mut collection = self.store.load()?;
        let taken = collection.take_first(predicate);
        if taken.is_some() {
            self.save(&collection)?;
        }
        Ok(taken)
    }

    /// Apply `change` to the record with the given id.
    ///
    /// The collection is saved only when `change` succeeds; a rejected change
    /// leaves the stored data untouched.
    pub fn modify<T, F>(&self, id: RecordId, change: F) -> Result<T, ManagerError>
    where
        F: FnOnce(&mut R) -> Result<T, ManagerError>,
    {
        let mut collection = self.store.load()?;
        let record = collection
            .find_mut(id)
            .ok_or_else(|| ManagerError::not_found(R::KIND, id))?;
        let outcome = change(record)?;
        self.save(&collection)?;
        Ok(outcome)
    }

    fn save(&self, collection: &Collection<R>) -> Result<(), StorageError> {
        self.store.save(collection)?;
        debug!(
            kind = %R::KIND,
            store = %self.store.location(),
            count = collection.len(),
            "Collection saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Customer;

    fn customer(id: RecordId) -> Customer {
        Customer {
            id,
            name: format!("c{id}"),
            age: 30,
        }
    }

    #[test]
    fn sequence_never_reuses_freed_ids() {
        let mut collection = Collection::new(vec![customer(1), customer(2)], 1);
        assert_eq!(collection.next_id(), 3);
        collection.remove(2);
        assert_eq!(collection.allocate_id(IdStrategy::Sequence), 3);
        assert_eq!(collection.allocate_id(IdStrategy::Sequence), 4);
    }

    #[test]
    fn count_plus_one_follows_length() {
        let mut collection = Collection::new(vec![customer(1), customer(2)], 10);
        collection.remove(1);
        assert_eq!(collection.allocate_id(IdStrategy::CountPlusOne), 2);
    }

    #[test]
    fn remove_reports_missing_ids() {
        let mut collection = Collection::new(vec![customer(1)], 1);
        assert!(!collection.remove(5));
        assert_eq!(collection.len(), 1);
        assert!(collection.remove(1));
        assert!(collection.is_empty());
    }

    #[test]
    fn modify_persists_only_on_success() {
        let store = MemoryStore::with_records(vec![customer(1)]);
        let repo = Repository::new(store.clone(), IdStrategy::Sequence);

        let rejected: Result<(), ManagerError> = repo.modify(1, |record| {
            record.name = "changed".to_string();
            Err(ManagerError::not_found(RecordKind::Hotel, 9))
        });
        assert!(rejected.is_err());
        assert_eq!(store.snapshot()[0].name, "c1");
        assert_eq!(store.save_count(), 0);

        repo.modify(1, |record| {
            record.name = "changed".to_string();
            Ok(())
        })
        .unwrap();
        assert_eq!(store.snapshot()[0].name, "changed");
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn get_reports_missing_id() {
        let repo = Repository::new(MemoryStore::<Customer>::new(), IdStrategy::Sequence);
        let err = repo.get(42).unwrap_err();
        assert_eq!(err.missing_id(), Some(42));
    }

    #[test]
    fn remove_first_leaves_store_untouched_without_match() {
        let store = MemoryStore::with_records(vec![customer(1)]);
        let repo = Repository::new(store.clone(), IdStrategy::Sequence);
        assert!(repo.remove_first(|c| c.age > 90).unwrap().is_none());
        assert_eq!(store.save_count(), 0);
    }
}
