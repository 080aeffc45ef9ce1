use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::{ManagerError, StorageError},
    models::{Customer, RecordId},
    storage::{CollectionStore, IdStrategy, JsonFileStore, Repository},
    update::{CustomerUpdate, UpdatePolicy},
};

/// Customer records.
pub struct CustomerManager {
    repo: Repository<Customer>,
    update_policy: UpdatePolicy,
}

impl CustomerManager {
    /// Open the customer collection configured in `config`.
    pub fn open(config: &AppConfig) -> Result<Self, StorageError> {
        let store = JsonFileStore::open(config.customers_path(), config.atomic_writes)?
            .with_sequence(config.id_strategy == IdStrategy::Sequence);
        Ok(Self::with_store(store, config.id_strategy, config.update_policy))
    }

    /// Build a manager over any backend.
    pub fn with_store(
        store: impl CollectionStore<Customer> + 'static,
        id_strategy: IdStrategy,
        update_policy: UpdatePolicy,
    ) -> Self {
        Self {
            repo: Repository::new(store, id_strategy),
            update_policy,
        }
    }

    /// Add a customer under the next id.
    pub fn add(&self, name: &str, age: u32) -> Result<Customer, StorageError> {
        let customer = self.repo.insert_with(|id| Customer {
            id,
            name: name.to_string(),
            age,
        })?;
        info!(id = customer.id, "Customer '{}' added", customer.name);
        Ok(customer)
    }

    /// Apply a partial update under the configured policy.
    pub fn update(&self, id: RecordId, update: CustomerUpdate) -> Result<Customer, ManagerError> {
        let policy = self.update_policy;
        let result = self.repo.modify(id, |customer| {
            if let Some(name) = policy.text(update.name.as_deref()) {
                customer.name = name;
            }
            if let Some(age) = policy.number(update.age) {
                customer.age = age;
            }
            Ok(customer.clone())
        });
        match &result {
            Ok(customer) => info!(id, "Customer '{}' updated", customer.name),
            Err(err) => warn!(id, "Customer update rejected: {err}"),
        }
        result
    }

    /// Remove a customer; missing ids are silently accepted.
    pub fn delete(&self, id: RecordId) -> Result<bool, StorageError> {
        let removed = self.repo.remove(id)?;
        info!(id, removed, "Customer deleted");
        Ok(removed)
    }

    /// The customer with the given id.
    pub fn get(&self, id: RecordId) -> Result<Customer, ManagerError> {
        self.repo.get(id)
    }

    /// All customers in stored order.
    pub fn list(&self) -> Result<Vec<Customer>, StorageError> {
        self.repo.all()
    }
}
