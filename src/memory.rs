use crate::errors::{AppError, AppResult};
use crate::models::Contact;
use crate::preferences::SettingsBackend;
use crate::store::ContactRepository;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory contact records, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryContactRepository {
    records: Mutex<MemoryRecords>,
    simulate_write_error: AtomicBool,
    failing_lists: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryRecords {
    contacts: BTreeMap<i64, Contact>,
    last_id: i64,
}

impl MemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: impl IntoIterator<Item = Contact>) -> AppResult<Self> {
        let repository = Self::new();
        for contact in contacts {
            repository.insert_contact(&contact)?;
        }
        Ok(repository)
    }

    /// Makes every insert, update and delete fail with a storage error.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Makes the next `count` list queries fail with a storage error.
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Simulated write error".to_string()));
        }
        Ok(())
    }

    fn records(&self) -> AppResult<std::sync::MutexGuard<'_, MemoryRecords>> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("memory store mutex poisoned".to_string()))
    }
}

impl ContactRepository for MemoryContactRepository {
    fn insert_contact(&self, contact: &Contact) -> AppResult<i64> {
        self.check_writable()?;
        let mut records = self.records()?;
        let id = if contact.is_persisted() {
            contact.id
        } else {
            records.last_id + 1
        };
        records.last_id = records.last_id.max(id);
        records.contacts.insert(
            id,
            Contact {
                id,
                ..contact.clone()
            },
        );
        Ok(id)
    }

    fn update_contact(&self, contact: &Contact) -> AppResult<()> {
        self.check_writable()?;
        let mut records = self.records()?;
        match records.contacts.get_mut(&contact.id) {
            Some(existing) => {
                *existing = contact.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("No contact with id {}", contact.id))),
        }
    }

    fn delete_contact(&self, id: i64) -> AppResult<()> {
        self.check_writable()?;
        self.records()?.contacts.remove(&id);
        Ok(())
    }

    fn list_contacts(&self) -> AppResult<Vec<Contact>> {
        let pending_failure = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if pending_failure {
            return Err(AppError::Storage("Simulated read error".to_string()));
        }
        Ok(self.records()?.contacts.values().cloned().collect())
    }
}

/// In-memory settings table.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
    simulate_read_error: AtomicBool,
    simulate_write_error: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_simulate_read_error(&self, simulate: bool) {
        self.simulate_read_error.store(simulate, Ordering::SeqCst);
    }

    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }
}

impl SettingsBackend for MemorySettings {
    fn read_setting(&self, key: &str) -> AppResult<Option<String>> {
        if self.simulate_read_error.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Simulated read error".to_string()));
        }
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn write_setting(&self, key: &str, value_json: &str) -> AppResult<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Simulated write error".to_string()));
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        values.insert(key.to_string(), value_json.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryContactRepository;
    use crate::models::Contact;
    use crate::store::ContactRepository;

    #[test]
    fn insert_assigns_increasing_ids_and_replaces_explicit_ones() {
        let repository = MemoryContactRepository::new();
        let first = repository
            .insert_contact(&Contact::new("Ann", "1", None))
            .expect("insert");
        let second = repository
            .insert_contact(&Contact::new("Bob", "2", None))
            .expect("insert");
        assert_eq!((first, second), (1, 2));

        let mut replacement = Contact::new("Ann B.", "9", None);
        replacement.id = first;
        repository.insert_contact(&replacement).expect("replace");
        let all = repository.list_contacts().expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Ann B.");
    }
}
