//! Durable contact records with a live full-set feed; writes run in issue order.

use crate::errors::AppResult;
use crate::models::Contact;
use crate::write_queue::{PendingWrite, WriteQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub type ContactSet = Arc<Vec<Contact>>;

/// Raw persistence for contact records.
pub trait ContactRepository: Send + Sync {
    /// Assigns a fresh identity when `contact.id` is unset; otherwise replaces
    /// the record with that identity.
    fn insert_contact(&self, contact: &Contact) -> AppResult<i64>;

    /// Fails with `NotFound` when no record has `contact.id`.
    fn update_contact(&self, contact: &Contact) -> AppResult<()>;

    /// Idempotent: deleting a missing identity succeeds.
    fn delete_contact(&self, id: i64) -> AppResult<()>;

    fn list_contacts(&self) -> AppResult<Vec<Contact>>;
}

#[derive(Clone)]
pub struct RecordStore {
    repository: Arc<dyn ContactRepository>,
    queue: WriteQueue,
    live: Arc<watch::Sender<ContactSet>>,
}

impl RecordStore {
    /// Loads the initial record set; must be called from inside a tokio runtime.
    pub fn open(repository: Arc<dyn ContactRepository>) -> AppResult<Self> {
        let initial = repository.list_contacts()?;
        let (live, _) = watch::channel(Arc::new(initial));
        Ok(Self {
            repository,
            queue: WriteQueue::start("contacts"),
            live: Arc::new(live),
        })
    }

    pub fn insert(&self, contact: Contact) -> PendingWrite<i64> {
        let repository = self.repository.clone();
        let live = self.live.clone();
        self.queue.submit(move || {
            let id = repository.insert_contact(&contact)?;
            tracing::debug!(contact_id = id, "contact inserted");
            publish(repository.as_ref(), &live);
            Ok(id)
        })
    }

    pub fn update(&self, contact: Contact) -> PendingWrite<()> {
        let repository = self.repository.clone();
        let live = self.live.clone();
        self.queue.submit(move || {
            repository.update_contact(&contact)?;
            tracing::debug!(contact_id = contact.id, "contact updated");
            publish(repository.as_ref(), &live);
            Ok(())
        })
    }

    pub fn delete(&self, id: i64) -> PendingWrite<()> {
        let repository = self.repository.clone();
        let live = self.live.clone();
        self.queue.submit(move || {
            repository.delete_contact(id)?;
            tracing::debug!(contact_id = id, "contact deleted");
            publish(repository.as_ref(), &live);
            Ok(())
        })
    }

    /// The returned receiver reports the current set as unseen, so the first
    /// `changed()` resolves immediately; later ones follow each write.
    pub fn subscribe_all(&self) -> watch::Receiver<ContactSet> {
        let mut receiver = self.live.subscribe();
        receiver.mark_changed();
        receiver
    }

    pub fn current(&self) -> ContactSet {
        self.live.borrow().clone()
    }
}

const REQUERY_ATTEMPTS: u32 = 3;
const REQUERY_BACKOFF: Duration = Duration::from_millis(25);

// Runs on the write queue's blocking thread, so sleeping between attempts is fine.
fn publish(repository: &dyn ContactRepository, live: &watch::Sender<ContactSet>) {
    for attempt in 1..=REQUERY_ATTEMPTS {
        match repository.list_contacts() {
            Ok(contacts) => {
                live.send_replace(Arc::new(contacts));
                return;
            }
            Err(error) if attempt < REQUERY_ATTEMPTS => {
                tracing::warn!(attempt, error = %error, "contact query after write failed, retrying");
                std::thread::sleep(REQUERY_BACKOFF * attempt);
            }
            Err(error) => {
                tracing::error!(
                    attempts = REQUERY_ATTEMPTS,
                    error = %error,
                    "contact query after write failed, subscribers keep the previous set"
                );
            }
        }
    }
}
