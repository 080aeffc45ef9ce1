use std::sync::Arc;

use parking_lot::Mutex;

use super::{Collection, CollectionStore, Record};
use crate::{error::StorageError, models::RecordId};

/// Collection kept in memory. Clones share the same records, so a test can
/// hand one handle to a manager and inspect the data through another.
#[derive(Debug)]
pub struct MemoryStore<R> {
    inner: Arc<Mutex<Inner<R>>>,
}

#[derive(Debug)]
struct Inner<R> {
    records: Vec<R>,
    next_id: RecordId,
    saves: usize,
}

impl<R: Record> MemoryStore<R> {
    /// An empty store.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// A store seeded with records.
    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                records,
                next_id: 1,
                saves: 0,
            })),
        }
    }

    /// Copy of the stored records.
    pub fn snapshot(&self) -> Vec<R> {
        self.inner.lock().records.clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for MemoryStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record> CollectionStore<R> for MemoryStore<R> {
    fn load(&self) -> Result<Collection<R>, StorageError> {
        let inner = self.inner.lock();
        Ok(Collection::new(inner.records.clone(), inner.next_id))
    }

    fn save(&self, collection: &Collection<R>) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.records = collection.records().to_vec();
        inner.next_id = collection.next_id();
        inner.saves += 1;
        Ok(())
    }

    fn location(&self) -> String {
        format!("memory:{}", R::KIND)
    }
}
