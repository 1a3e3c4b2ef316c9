use std::path::PathBuf;

use parking_lot::Mutex;

use crate::api::{Entry, EntryBackend, NewEntry};
use crate::dates;
use crate::export::Exporter;
use crate::search::EntryFilter;

mod error;
pub mod form;
pub mod state;

pub use error::StoreError;
pub use form::{EntryForm, ValidationError};
pub use state::{Activity, EditSession, GroupedView, InFlight, PendingDelete, ViewState};

/// View-model over one backend: the grouped month view plus every
/// transient flag. All methods take `&self`; the state lock is never held
/// across an await, so operations on different entries can run
/// concurrently within one task.
pub struct EntryStore<B> {
    backend: B,
    state: Mutex<ViewState>,
}

impl<B: EntryBackend> EntryStore<B> {
    pub fn new(backend: B, month: impl Into<String>) -> Self {
        Self {
            backend,
            state: Mutex::new(ViewState::new(month)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.lock().clone()
    }

    pub fn groups(&self) -> GroupedView {
        self.state.lock().view.clone()
    }

    pub fn month(&self) -> String {
        self.state.lock().month.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn status_message(&self) -> Option<String> {
        self.state.lock().status_message.clone()
    }

    pub fn editing_id(&self) -> Option<i64> {
        self.state.lock().editing_id()
    }

    pub fn is_saving(&self, id: i64) -> bool {
        self.state.lock().is_saving(id)
    }

    pub fn is_deleting(&self, id: i64) -> bool {
        self.state.lock().is_deleting(id)
    }

    pub fn is_exporting(&self, date: &str) -> bool {
        self.state.lock().is_exporting(date)
    }

    pub fn pending_delete(&self) -> Option<PendingDelete> {
        self.state.lock().pending_delete.clone()
    }

    /// Entries matching `query`; the stored view is left untouched.
    pub fn filtered(&self, query: &str) -> GroupedView {
        let filter = EntryFilter::new(query);
        filter.apply(&self.state.lock().view)
    }

    /// Selects `month` and replaces the view with its entries. On failure
    /// the error is recorded and the view is emptied.
    pub async fn load(&self, month: &str) -> Result<(), StoreError> {
        let generation = {
            let mut state = self.state.lock();
            state.month = month.to_string();
            state.error = None;
            state.loads_in_flight += 1;
            state.loading = true;
            state.load_generation += 1;
            state.load_generation
        };
        let _guard = LoadGuard { state: &self.state };
        tracing::debug!(month, generation, "loading entries");

        let result = self.backend.fetch_entries_by_month(month).await;

        let mut state = self.state.lock();
        if state.load_generation != generation {
            tracing::debug!(month, generation, "discarding superseded load");
            return result.map(|_| ()).map_err(StoreError::from);
        }
        match result {
            Ok(entries) => {
                let count = entries.len();
                state.view = GroupedView::from_entries(entries);
                let fresh = state
                    .editing_id()
                    .map(|id| state.view.find(id).map(|(_, _, entry)| entry.clone()));
                match fresh {
                    Some(Some(entry)) => {
                        if let Some(session) = state.editing.as_mut() {
                            session.original = entry;
                        }
                    }
                    Some(None) => state.editing = None,
                    None => {}
                }
                tracing::debug!(month, count, "entries loaded");
                Ok(())
            }
            Err(err) => {
                tracing::error!(month, error = %err, "failed to load entries");
                state.view = GroupedView::default();
                state.editing = None;
                state.error = Some(err.to_string());
                state.set_status_message(Some(format!("Failed to load entries: {err}")));
                Err(err.into())
            }
        }
    }

    pub async fn reload(&self) -> Result<(), StoreError> {
        let month = self.month();
        self.load(&month).await
    }

    pub async fn set_month(&self, month: &str) -> Result<(), StoreError> {
        if !dates::is_valid_month(month) {
            return Err(StoreError::InvalidMonth(month.to_string()));
        }
        self.load(month).await
    }

    /// Validates and submits the form. On success the form is reset for the
    /// next entry and the view is reloaded.
    pub async fn add(&self, form: &mut EntryForm) -> Result<Entry, StoreError> {
        let payload = form.validate()?;
        let created = match self.backend.add_entry(&payload).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!(error = %err, "failed to add entry");
                self.set_status(format!("Failed to add entry: {err}"));
                return Err(err.into());
            }
        };
        tracing::info!(id = created.id, date = created.date_key(), "entry added");
        form.reset_after_submit();
        self.set_status("Entry added");
        if let Err(err) = self.reload().await {
            self.set_status(format!("Entry added, but refreshing failed: {err}"));
        }
        Ok(created)
    }

    /// Puts `id` into edit mode. A different entry already being edited has
    /// its unsaved changes discarded.
    pub fn begin_edit(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        ensure_idle(&state, id)?;
        if state.editing_id() == Some(id) {
            return Ok(());
        }
        let original = match state.view.find(id) {
            Some((_, _, entry)) => entry.clone(),
            None => return Err(StoreError::NotFound(id)),
        };
        if let Some(previous) = state.abandon_edit() {
            tracing::debug!(previous, "discarding unsaved edit");
        }
        state.editing = Some(EditSession { id, original });
        Ok(())
    }

    /// Replaces the entry at `(date, index)` with a local draft. Nothing is
    /// sent and nothing is re-sorted.
    pub fn local_update(&self, date: &str, index: usize, updated: Entry) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let editing = state.editing_id();
        let slot = state
            .view
            .slot_mut(date, index)
            .ok_or_else(|| StoreError::NoSuchPosition {
                date: date.to_string(),
                index,
            })?;
        if editing != Some(slot.id) {
            return Err(StoreError::NotEditing(slot.id));
        }
        if updated.id != slot.id {
            return Err(StoreError::IdMismatch {
                expected: slot.id,
                found: updated.id,
            });
        }
        *slot = updated;
        Ok(())
    }

    /// Sends the current draft of `id`. Success leaves edit mode and
    /// reloads; failure keeps the draft in edit mode.
    pub async fn confirm_edit(&self, id: i64) -> Result<Entry, StoreError> {
        let payload = {
            let mut state = self.state.lock();
            if state.editing_id() != Some(id) {
                return Err(StoreError::NotEditing(id));
            }
            ensure_idle(&state, id)?;
            let payload = match state.view.find(id) {
                Some((_, _, draft)) => NewEntry::from_draft(draft),
                None => return Err(StoreError::NotFound(id)),
            };
            state.in_flight.saving.insert(id);
            payload
        };
        let _guard = InFlightGuard {
            state: &self.state,
            marker: Marker::Saving(id),
        };

        match self.backend.update_entry(id, &payload).await {
            Ok(updated) => {
                tracing::info!(id, "entry updated");
                {
                    let mut state = self.state.lock();
                    if state.editing_id() == Some(id) {
                        state.editing = None;
                    }
                    state.set_status_message(Some("Entry updated"));
                }
                if let Err(err) = self.reload().await {
                    self.set_status(format!("Entry updated, but refreshing failed: {err}"));
                }
                Ok(updated)
            }
            Err(err) => {
                tracing::error!(id, error = %err, "failed to update entry");
                self.set_status(format!("Failed to update entry: {err}"));
                Err(err.into())
            }
        }
    }

    /// Restores the server copy of the edited entry and leaves edit mode.
    pub fn cancel_edit(&self) -> Option<i64> {
        self.state.lock().abandon_edit()
    }

    /// Opens the confirmation step for deleting `id`.
    pub fn request_delete(&self, id: i64) -> Result<PendingDelete, StoreError> {
        let mut state = self.state.lock();
        ensure_idle(&state, id)?;
        let pending = match state.view.find(id) {
            Some((_, _, entry)) => PendingDelete::for_entry(entry),
            None => return Err(StoreError::NotFound(id)),
        };
        state.pending_delete = Some(pending.clone());
        Ok(pending)
    }

    pub fn cancel_delete(&self) -> Option<PendingDelete> {
        self.state.lock().pending_delete.take()
    }

    /// Deletes the entry awaiting confirmation and reloads on success.
    pub async fn confirm_delete(&self) -> Result<i64, StoreError> {
        let id = {
            let mut state = self.state.lock();
            let pending = state
                .pending_delete
                .take()
                .ok_or(StoreError::NoPendingDelete)?;
            if let Err(err) = ensure_idle(&state, pending.id) {
                state.pending_delete = Some(pending);
                return Err(err);
            }
            state.in_flight.deleting.insert(pending.id);
            pending.id
        };
        let _guard = InFlightGuard {
            state: &self.state,
            marker: Marker::Deleting(id),
        };

        match self.backend.delete_entry(id).await {
            Ok(()) => {
                tracing::info!(id, "entry deleted");
                {
                    let mut state = self.state.lock();
                    if state.editing_id() == Some(id) {
                        state.editing = None;
                    }
                    state.set_status_message(Some("Entry deleted"));
                }
                if let Err(err) = self.reload().await {
                    self.set_status(format!("Entry deleted, but refreshing failed: {err}"));
                }
                Ok(id)
            }
            Err(err) => {
                tracing::error!(id, error = %err, "failed to delete entry");
                self.set_status(format!("Failed to delete entry: {err}"));
                Err(err.into())
            }
        }
    }

    /// Exports one day through `exporter`. Different days may export at the
    /// same time; the latest one owns `exporting_date`. Re-exporting a day
    /// that is still in progress is rejected.
    pub async fn export<E: Exporter>(
        &self,
        date: &str,
        entries: &[Entry],
        exporter: &E,
    ) -> Result<PathBuf, StoreError> {
        {
            let mut state = self.state.lock();
            if state.is_exporting(date) {
                return Err(StoreError::ExportBusy(date.to_string()));
            }
            state.in_flight.exporting_date = Some(date.to_string());
        }
        let _guard = InFlightGuard {
            state: &self.state,
            marker: Marker::Exporting(date.to_string()),
        };

        match exporter.export_day(date, entries).await {
            Ok(path) => {
                self.set_status(format!("Exported {}", path.display()));
                Ok(path)
            }
            Err(err) => {
                tracing::error!(date, error = %err, "export failed");
                self.set_status(format!("Export failed: {err}"));
                Err(err.into())
            }
        }
    }

    fn set_status(&self, message: impl Into<String>) {
        self.state.lock().set_status_message(Some(message));
    }
}

fn ensure_idle(state: &ViewState, id: i64) -> Result<(), StoreError> {
    match state.in_flight.activity(id) {
        Some(activity) => Err(StoreError::Busy { id, activity }),
        None => Ok(()),
    }
}

struct LoadGuard<'a> {
    state: &'a Mutex<ViewState>,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.loads_in_flight = state.loads_in_flight.saturating_sub(1);
        state.loading = state.loads_in_flight > 0;
    }
}

enum Marker {
    Saving(i64),
    Deleting(i64),
    Exporting(String),
}

struct InFlightGuard<'a> {
    state: &'a Mutex<ViewState>,
    marker: Marker,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        match &self.marker {
            Marker::Saving(id) => {
                state.in_flight.saving.remove(id);
            }
            Marker::Deleting(id) => {
                state.in_flight.deleting.remove(id);
            }
            // a newer export of another day may own the marker by now
            Marker::Exporting(date) => {
                if state.is_exporting(date) {
                    state.in_flight.exporting_date = None;
                }
            }
        }
    }
}
