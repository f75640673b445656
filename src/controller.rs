//! Contact list state owned by one actor task; intents return once applied
//! locally, persistence completions arrive back as events.

use crate::errors::{AppError, AppResult};
use crate::models::{AppTheme, Contact, ContactListState, EditDraft, FieldErrors, SortOrder, ViewPreferences};
use crate::preferences::{PreferenceKey, PreferenceStore};
use crate::sharing::{SharingAction, SubscriptionSharing};
use crate::store::{ContactSet, RecordStore};
use crate::validation::{error_message, validate_all, validate_email};
use crate::view::derive_view;
use crate::write_queue::PendingWrite;
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Duration;
use uuid::Uuid;

/// A user intent forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetSearchQuery(String),
    ToggleSortOrder,
    ToggleLayout,
    CycleTheme,
    BeginAddContact,
    BeginEditContact(Contact),
    ChangeDraftName(String),
    ChangeDraftPhone(String),
    ChangeDraftEmail(String),
    DismissDialog,
    SaveOrUpdate,
    RequestDelete(Contact),
    ConfirmDelete,
    CancelDelete,
    ClearStorageError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Validation passed and the write was issued.
    Submitted,
    Rejected(FieldErrors),
    /// A save for the same dialog is still in flight.
    AlreadySaving,
    NoDialog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentReply {
    Applied,
    Save(SaveOutcome),
}

enum Event {
    Intent(Intent, oneshot::Sender<IntentReply>),
    ObserverAttached(Uuid),
    ObserverDetached(Uuid),
    ReleaseDue(u64),
    SaveFinished { dialog_id: u64, result: AppResult<()> },
    DeleteFinished { contact_id: i64, result: AppResult<()> },
    PreferenceWriteSettled(PreferenceKey),
    Shutdown,
}

#[derive(Clone)]
pub struct ContactListController {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<ContactListState>,
}

impl ContactListController {
    /// Starts the controller task; must be called from inside a tokio runtime.
    pub fn spawn(store: RecordStore, preferences: PreferenceStore, subscription_grace: Duration) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let stored = preferences.current();
        let initial = ControllerState {
            preferences: stored,
            ..ControllerState::default()
        };
        let (published, state) = watch::channel(initial.to_view());
        let preferences_feed = Some(preferences.subscribe());

        let actor = ControllerActor {
            store,
            preferences,
            events,
            events_tx: events_tx.downgrade(),
            published,
            sharing: SubscriptionSharing::new(subscription_grace),
            contacts_feed: None,
            preferences_feed,
            stored_theme: StoredPreference::new(stored.theme),
            stored_grid_layout: StoredPreference::new(stored.is_grid_layout),
            next_dialog_id: 0,
            state: initial,
        };
        tokio::spawn(actor.run());

        Self {
            events: events_tx,
            state,
        }
    }

    pub async fn dispatch(&self, intent: Intent) -> AppResult<IntentReply> {
        let (reply, answer) = oneshot::channel();
        self.events
            .send(Event::Intent(intent, reply))
            .map_err(|_| controller_stopped())?;
        answer.await.map_err(|_| controller_stopped())
    }

    async fn apply(&self, intent: Intent) -> AppResult<()> {
        self.dispatch(intent).await.map(|_| ())
    }

    pub async fn set_search_query(&self, text: impl Into<String>) -> AppResult<()> {
        self.apply(Intent::SetSearchQuery(text.into())).await
    }

    pub async fn toggle_sort_order(&self) -> AppResult<()> {
        self.apply(Intent::ToggleSortOrder).await
    }

    pub async fn toggle_layout(&self) -> AppResult<()> {
        self.apply(Intent::ToggleLayout).await
    }

    pub async fn cycle_theme(&self) -> AppResult<()> {
        self.apply(Intent::CycleTheme).await
    }

    pub async fn begin_add_contact(&self) -> AppResult<()> {
        self.apply(Intent::BeginAddContact).await
    }

    pub async fn begin_edit_contact(&self, contact: &Contact) -> AppResult<()> {
        self.apply(Intent::BeginEditContact(contact.clone())).await
    }

    pub async fn change_draft_name(&self, text: impl Into<String>) -> AppResult<()> {
        self.apply(Intent::ChangeDraftName(text.into())).await
    }

    pub async fn change_draft_phone(&self, text: impl Into<String>) -> AppResult<()> {
        self.apply(Intent::ChangeDraftPhone(text.into())).await
    }

    pub async fn change_draft_email(&self, text: impl Into<String>) -> AppResult<()> {
        self.apply(Intent::ChangeDraftEmail(text.into())).await
    }

    pub async fn dismiss_dialog(&self) -> AppResult<()> {
        self.apply(Intent::DismissDialog).await
    }

    pub async fn save_or_update(&self) -> AppResult<SaveOutcome> {
        match self.dispatch(Intent::SaveOrUpdate).await? {
            IntentReply::Save(outcome) => Ok(outcome),
            IntentReply::Applied => Err(AppError::Internal(
                "save intent answered without an outcome".to_string(),
            )),
        }
    }

    pub async fn request_delete(&self, contact: &Contact) -> AppResult<()> {
        self.apply(Intent::RequestDelete(contact.clone())).await
    }

    pub async fn confirm_delete(&self) -> AppResult<()> {
        self.apply(Intent::ConfirmDelete).await
    }

    pub async fn cancel_delete(&self) -> AppResult<()> {
        self.apply(Intent::CancelDelete).await
    }

    pub async fn clear_storage_error(&self) -> AppResult<()> {
        self.apply(Intent::ClearStorageError).await
    }

    /// Name for the delete-confirmation prompt; empty when nothing is pending.
    pub fn name_to_delete(&self) -> String {
        self.state.borrow().name_to_delete().to_string()
    }

    /// Current state without registering as an observer.
    pub fn snapshot(&self) -> ContactListState {
        self.state.borrow().clone()
    }

    /// Registers an observer; the live record subscription runs while at
    /// least one observer is alive.
    pub fn observe(&self) -> ContactListObserver {
        let id = Uuid::new_v4();
        if self.events.send(Event::ObserverAttached(id)).is_err() {
            tracing::warn!(observer_id = %id, "observer attached to a stopped controller");
        }
        ContactListObserver {
            receiver: self.state.clone(),
            _registration: ObserverRegistration {
                id,
                events: self.events.clone(),
            },
        }
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }
}

pub struct ContactListObserver {
    receiver: watch::Receiver<ContactListState>,
    _registration: ObserverRegistration,
}

impl ContactListObserver {
    pub fn current(&self) -> ContactListState {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published state. Intermediate states may be skipped.
    pub async fn changed(&mut self) -> AppResult<ContactListState> {
        self.receiver.changed().await.map_err(|_| controller_stopped())?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ContactListState) -> bool,
    ) -> AppResult<ContactListState> {
        let state = self
            .receiver
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| controller_stopped())?;
        Ok(state.clone())
    }
}

struct ObserverRegistration {
    id: Uuid,
    events: mpsc::UnboundedSender<Event>,
}

impl Drop for ObserverRegistration {
    fn drop(&mut self) {
        let _ = self.events.send(Event::ObserverDetached(self.id));
    }
}

fn controller_stopped() -> AppError {
    AppError::Internal("contact list controller has stopped".to_string())
}

struct DialogSession {
    id: u64,
    draft: EditDraft,
    saving: bool,
}

#[derive(Default)]
struct ControllerState {
    contacts: ContactSet,
    search_query: String,
    sort_order: SortOrder,
    preferences: ViewPreferences,
    dialog: Option<DialogSession>,
    field_errors: FieldErrors,
    pending_deletion: Option<Contact>,
    delete_confirm_open: bool,
    storage_error: Option<String>,
}

impl ControllerState {
    fn to_view(&self) -> ContactListState {
        ContactListState {
            filtered_contacts: derive_view(&self.contacts, &self.search_query, self.sort_order),
            search_query: self.search_query.clone(),
            sort_order: self.sort_order,
            theme: self.preferences.theme,
            is_grid_layout: self.preferences.is_grid_layout,
            dialog_open: self.dialog.is_some(),
            draft: self
                .dialog
                .as_ref()
                .map(|dialog| dialog.draft.clone())
                .unwrap_or_default(),
            field_errors: self.field_errors.clone(),
            delete_confirm_open: self.delete_confirm_open,
            pending_deletion: self.pending_deletion.clone(),
            storage_error: self.storage_error.clone(),
        }
    }
}

struct ControllerActor {
    store: RecordStore,
    preferences: PreferenceStore,
    events: mpsc::UnboundedReceiver<Event>,
    events_tx: mpsc::WeakUnboundedSender<Event>,
    published: watch::Sender<ContactListState>,
    sharing: SubscriptionSharing,
    contacts_feed: Option<watch::Receiver<ContactSet>>,
    preferences_feed: Option<watch::Receiver<ViewPreferences>>,
    stored_theme: StoredPreference<AppTheme>,
    stored_grid_layout: StoredPreference<bool>,
    next_dialog_id: u64,
    state: ControllerState,
}

impl ControllerActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    if !self.handle_event(event) {
                        break;
                    }
                }
                contacts = next_value(&mut self.contacts_feed) => match contacts {
                    Some(contacts) => self.state.contacts = contacts,
                    None => {
                        tracing::warn!("contact feed closed");
                        self.contacts_feed = None;
                    }
                },
                preferences = next_value(&mut self.preferences_feed) => match preferences {
                    Some(preferences) => self.apply_stored_preferences(preferences),
                    None => {
                        tracing::warn!("preference feed closed");
                        self.preferences_feed = None;
                    }
                },
            }
            self.publish();
        }
        tracing::debug!("contact list controller stopped");
    }

    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Intent(intent, reply) => {
                tracing::trace!(?intent, "applying intent");
                let answer = self.apply_intent(intent);
                self.publish();
                let _ = reply.send(answer);
            }
            Event::ObserverAttached(id) => {
                let action = self.sharing.attach(id);
                self.apply_sharing(action);
            }
            Event::ObserverDetached(id) => {
                let action = self.sharing.detach(id);
                self.apply_sharing(action);
            }
            Event::ReleaseDue(generation) => {
                if self.sharing.release_due(generation) {
                    self.stop_contact_feed();
                }
            }
            Event::SaveFinished { dialog_id, result } => self.finish_save(dialog_id, result),
            Event::DeleteFinished { contact_id, result } => self.finish_delete(contact_id, result),
            Event::PreferenceWriteSettled(key) => match key {
                PreferenceKey::AppTheme => self.stored_theme.write_settled(),
                PreferenceKey::IsGridView => self.stored_grid_layout.write_settled(),
            },
            Event::Shutdown => return false,
        }
        true
    }

    fn apply_intent(&mut self, intent: Intent) -> IntentReply {
        match intent {
            Intent::SetSearchQuery(text) => self.state.search_query = text,
            Intent::ToggleSortOrder => self.state.sort_order = self.state.sort_order.toggled(),
            Intent::ToggleLayout => self.toggle_layout(),
            Intent::CycleTheme => self.cycle_theme(),
            Intent::BeginAddContact => self.open_dialog(EditDraft::default()),
            Intent::BeginEditContact(contact) => self.open_dialog(EditDraft::for_contact(&contact)),
            Intent::ChangeDraftName(text) => self.change_draft_name(text),
            Intent::ChangeDraftPhone(text) => self.change_draft_phone(text),
            Intent::ChangeDraftEmail(text) => self.change_draft_email(text),
            Intent::DismissDialog => self.dismiss_dialog(),
            Intent::SaveOrUpdate => return IntentReply::Save(self.save_or_update()),
            Intent::RequestDelete(contact) => {
                self.state.pending_deletion = Some(contact);
                self.state.delete_confirm_open = true;
            }
            Intent::ConfirmDelete => self.confirm_delete(),
            Intent::CancelDelete => self.close_delete_confirmation(),
            Intent::ClearStorageError => self.state.storage_error = None,
        }
        IntentReply::Applied
    }

    fn toggle_layout(&mut self) {
        let is_grid_layout = !self.state.preferences.is_grid_layout;
        self.state.preferences.is_grid_layout = is_grid_layout;
        self.stored_grid_layout.write_started();
        let write = self.preferences.write_grid_layout(is_grid_layout);
        self.track_preference_write(PreferenceKey::IsGridView, write);
    }

    fn cycle_theme(&mut self) {
        let theme = self.state.preferences.theme.next();
        self.state.preferences.theme = theme;
        self.stored_theme.write_started();
        let write = self.preferences.write_theme(theme);
        self.track_preference_write(PreferenceKey::AppTheme, write);
    }

    fn track_preference_write(&self, key: PreferenceKey, write: PendingWrite<()>) {
        self.report_when_done(write.outcome(), move |result| {
            if let Err(error) = result {
                tracing::warn!(key = key.as_str(), error = %error, "preference write failed, keeping in-memory value");
            }
            Event::PreferenceWriteSettled(key)
        });
    }

    // Each key is adopted on its own, so an emission caused by one key never
    // rewrites the other with a stale stored value.
    fn apply_stored_preferences(&mut self, preferences: ViewPreferences) {
        if let Some(theme) = self.stored_theme.observe(preferences.theme) {
            self.state.preferences.theme = theme;
        }
        if let Some(is_grid_layout) = self.stored_grid_layout.observe(preferences.is_grid_layout) {
            self.state.preferences.is_grid_layout = is_grid_layout;
        }
    }

    fn open_dialog(&mut self, draft: EditDraft) {
        self.next_dialog_id += 1;
        self.state.field_errors = FieldErrors::default();
        self.state.dialog = Some(DialogSession {
            id: self.next_dialog_id,
            draft,
            saving: false,
        });
    }

    fn change_draft_name(&mut self, text: String) {
        let Some(dialog) = self.state.dialog.as_mut() else {
            tracing::debug!("draft name change ignored, no dialog open");
            return;
        };
        if !text.trim().is_empty() {
            self.state.field_errors.name_error.clear();
        }
        dialog.draft.name = text;
    }

    fn change_draft_phone(&mut self, text: String) {
        let Some(dialog) = self.state.dialog.as_mut() else {
            tracing::debug!("draft phone change ignored, no dialog open");
            return;
        };
        if !text.trim().is_empty() {
            self.state.field_errors.phone_error.clear();
        }
        dialog.draft.phone_number = text;
    }

    fn change_draft_email(&mut self, text: String) {
        let Some(dialog) = self.state.dialog.as_mut() else {
            tracing::debug!("draft email change ignored, no dialog open");
            return;
        };
        self.state.field_errors.email_error = error_message(validate_email(&text));
        dialog.draft.email = text;
    }

    fn dismiss_dialog(&mut self) {
        self.state.dialog = None;
        self.state.field_errors = FieldErrors::default();
    }

    fn save_or_update(&mut self) -> SaveOutcome {
        let Some(dialog) = self.state.dialog.as_mut() else {
            return SaveOutcome::NoDialog;
        };
        if dialog.saving {
            return SaveOutcome::AlreadySaving;
        }

        let validation = validate_all(&dialog.draft);
        self.state.field_errors = validation.errors.clone();
        if !validation.accepted {
            return SaveOutcome::Rejected(validation.errors);
        }

        let name = dialog.draft.name.trim().to_string();
        let phone_number = dialog.draft.phone_number.trim().to_string();
        let email = Some(dialog.draft.email.trim().to_string()).filter(|email| !email.is_empty());
        let edit_target = dialog.draft.edit_target_id();
        let dialog_id = dialog.id;
        dialog.saving = true;

        match edit_target {
            None => {
                let write = self.store.insert(Contact::new(name, phone_number, email));
                self.report_when_done(write.outcome(), move |result| Event::SaveFinished {
                    dialog_id,
                    result: result.map(|_| ()),
                });
            }
            Some(id) => {
                let write = self.store.update(Contact {
                    id,
                    name,
                    phone_number,
                    email,
                });
                self.report_when_done(write.outcome(), move |result| Event::SaveFinished {
                    dialog_id,
                    result,
                });
            }
        }
        SaveOutcome::Submitted
    }

    fn finish_save(&mut self, dialog_id: u64, result: AppResult<()>) {
        let still_open = self.state.dialog.as_ref().map(|dialog| dialog.id) == Some(dialog_id);
        match result {
            Ok(()) if still_open => self.dismiss_dialog(),
            Ok(()) => {
                tracing::debug!(dialog_id, "save finished after its dialog was closed");
            }
            Err(error) => {
                tracing::error!(dialog_id, error = %error, "failed to save contact");
                self.state.storage_error = Some(error.to_string());
                if let Some(dialog) = self.state.dialog.as_mut().filter(|dialog| dialog.id == dialog_id) {
                    dialog.saving = false;
                }
            }
        }
    }

    fn confirm_delete(&mut self) {
        if let Some(contact) = self.state.pending_deletion.take() {
            let contact_id = contact.id;
            let write = self.store.delete(contact_id);
            self.report_when_done(write.outcome(), move |result| Event::DeleteFinished {
                contact_id,
                result,
            });
        }
        self.close_delete_confirmation();
    }

    // Checked on completion, against whatever dialog is open at that point.
    fn finish_delete(&mut self, contact_id: i64, result: AppResult<()>) {
        match result {
            Ok(()) => {
                let editing_deleted = self
                    .state
                    .dialog
                    .as_ref()
                    .and_then(|dialog| dialog.draft.edit_target_id())
                    == Some(contact_id);
                if editing_deleted {
                    tracing::info!(contact_id, "closing editor for deleted contact");
                    self.dismiss_dialog();
                }
            }
            Err(error) => {
                tracing::error!(contact_id, error = %error, "failed to delete contact");
                self.state.storage_error = Some(error.to_string());
            }
        }
    }

    fn close_delete_confirmation(&mut self) {
        self.state.pending_deletion = None;
        self.state.delete_confirm_open = false;
    }

    fn apply_sharing(&mut self, action: SharingAction) {
        match action {
            SharingAction::Nothing => {}
            SharingAction::Start => {
                let mut feed = self.store.subscribe_all();
                self.state.contacts = feed.borrow_and_update().clone();
                self.contacts_feed = Some(feed);
                tracing::debug!(observers = self.sharing.observer_count(), "contact feed started");
            }
            SharingAction::Stop => self.stop_contact_feed(),
            SharingAction::ScheduleRelease { generation, after } => {
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if let Some(events) = events.upgrade() {
                        let _ = events.send(Event::ReleaseDue(generation));
                    }
                });
            }
        }
    }

    fn stop_contact_feed(&mut self) {
        if self.contacts_feed.take().is_some() {
            tracing::debug!("contact feed released");
        }
    }

    fn report_when_done<F, M>(&self, future: F, into_event: M)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        M: FnOnce(F::Output) -> Event + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = into_event(future.await);
            if let Some(events) = events.upgrade() {
                let _ = events.send(event);
            }
        });
    }

    fn publish(&self) {
        let next = self.state.to_view();
        self.published.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Tracks one stored preference key as seen through the store's feed.
///
/// A stored value replaces the in-memory one only when it differs from the
/// last stored value seen and no write of ours to that key is outstanding.
/// A failed write therefore leaves the optimistic value in place until the
/// stored value really changes.
#[derive(Debug)]
struct StoredPreference<T> {
    last_seen: T,
    writes_in_flight: usize,
}

impl<T: Copy + PartialEq> StoredPreference<T> {
    fn new(stored: T) -> Self {
        Self {
            last_seen: stored,
            writes_in_flight: 0,
        }
    }

    fn write_started(&mut self) {
        self.writes_in_flight += 1;
    }

    fn write_settled(&mut self) {
        self.writes_in_flight = self.writes_in_flight.saturating_sub(1);
    }

    fn observe(&mut self, stored: T) -> Option<T> {
        let changed = stored != self.last_seen;
        self.last_seen = stored;
        (changed && self.writes_in_flight == 0).then_some(stored)
    }
}

async fn next_value<T: Clone>(feed: &mut Option<watch::Receiver<T>>) -> Option<T> {
    let Some(receiver) = feed.as_mut() else {
        return std::future::pending().await;
    };
    match receiver.changed().await {
        Ok(()) => Some(receiver.borrow_and_update().clone()),
        Err(_) => None,
    }
}
