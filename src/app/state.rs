use std::collections::HashSet;

use indexmap::IndexMap;
use strum::Display;

use crate::api::Entry;

/// Entries partitioned by date key, most recent day first, each day sorted
/// by `entry_time` ascending (stable for equal times).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedView {
    groups: IndexMap<String, Vec<Entry>>,
}

impl GroupedView {
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut groups: IndexMap<String, Vec<Entry>> = IndexMap::new();
        for entry in entries {
            groups
                .entry(entry.date_key().to_string())
                .or_default()
                .push(entry);
        }
        for day in groups.values_mut() {
            day.sort_by(|a, b| a.entry_time.cmp(&b.entry_time));
        }
        groups.sort_by(|a, _, b, _| b.cmp(a));
        Self { groups }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entry])> {
        self.groups
            .iter()
            .map(|(date, entries)| (date.as_str(), entries.as_slice()))
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn get(&self, date: &str) -> Option<&[Entry]> {
        self.groups.get(date).map(Vec::as_slice)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Position of an entry: `(date key, index within the day, entry)`.
    pub fn find(&self, id: i64) -> Option<(&str, usize, &Entry)> {
        self.groups.iter().find_map(|(date, entries)| {
            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| (date.as_str(), index, &entries[index]))
        })
    }

    pub fn contains(&self, id: i64) -> bool {
        self.find(id).is_some()
    }

    pub(crate) fn slot_mut(&mut self, date: &str, index: usize) -> Option<&mut Entry> {
        self.groups.get_mut(date).and_then(|day| day.get_mut(index))
    }

    pub(crate) fn entry_mut(&mut self, id: i64) -> Option<&mut Entry> {
        self.groups
            .values_mut()
            .flat_map(|day| day.iter_mut())
            .find(|entry| entry.id == id)
    }

    /// New view with only the entries `keep` accepts; empty days are dropped.
    pub fn retain_entries<F>(&self, mut keep: F) -> GroupedView
    where
        F: FnMut(&Entry) -> bool,
    {
        let groups = self
            .groups
            .iter()
            .filter_map(|(date, entries)| {
                let kept: Vec<Entry> = entries.iter().filter(|e| keep(*e)).cloned().collect();
                (!kept.is_empty()).then(|| (date.clone(), kept))
            })
            .collect();
        GroupedView { groups }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Activity {
    Saving,
    Deleting,
    Editing,
}

/// Per-entry operations awaiting the backend. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlight {
    pub saving: HashSet<i64>,
    pub deleting: HashSet<i64>,
    pub exporting_date: Option<String>,
}

impl InFlight {
    pub fn activity(&self, id: i64) -> Option<Activity> {
        if self.saving.contains(&id) {
            Some(Activity::Saving)
        } else if self.deleting.contains(&id) {
            Some(Activity::Deleting)
        } else {
            None
        }
    }

    pub fn is_idle(&self) -> bool {
        self.saving.is_empty() && self.deleting.is_empty() && self.exporting_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub id: i64,
    /// Last copy received from the backend, restored when the edit is abandoned.
    pub original: Entry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub preview: String,
}

impl PendingDelete {
    pub(crate) fn for_entry(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            date: entry.date_key().to_string(),
            time: entry.time_label().to_string(),
            preview: entry.description.lines().next().unwrap_or("").to_string(),
        }
    }
}

/// Everything the entry store owns. Snapshots of it are what renderers see.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub month: String,
    pub view: GroupedView,
    pub loading: bool,
    pub error: Option<String>,
    pub editing: Option<EditSession>,
    pub in_flight: InFlight,
    pub pending_delete: Option<PendingDelete>,
    pub status_message: Option<String>,
    pub(crate) loads_in_flight: usize,
    pub(crate) load_generation: u64,
}

impl ViewState {
    pub fn new(month: impl Into<String>) -> Self {
        Self {
            month: month.into(),
            ..Self::default()
        }
    }

    pub fn editing_id(&self) -> Option<i64> {
        self.editing.as_ref().map(|session| session.id)
    }

    pub fn is_saving(&self, id: i64) -> bool {
        self.in_flight.saving.contains(&id)
    }

    pub fn is_deleting(&self, id: i64) -> bool {
        self.in_flight.deleting.contains(&id)
    }

    pub fn is_exporting(&self, date: &str) -> bool {
        self.in_flight.exporting_date.as_deref() == Some(date)
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    /// Puts the server copy of the edited entry back and leaves edit mode.
    pub(crate) fn abandon_edit(&mut self) -> Option<i64> {
        let session = self.editing.take()?;
        if let Some(slot) = self.view.entry_mut(session.id) {
            *slot = session.original;
        }
        Some(session.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, date: &str, time: &str) -> Entry {
        Entry {
            id,
            entry_date: date.into(),
            entry_time: time.into(),
            description: format!("entry {id}"),
        }
    }

    #[test]
    fn groups_are_keyed_by_truncated_date() {
        let view = GroupedView::from_entries(vec![
            entry(1, "2024-03-01T00:00:00.000Z", "09:00:00"),
            entry(2, "2024-03-01", "08:00:00"),
        ]);
        assert_eq!(view.dates().collect::<Vec<_>>(), vec!["2024-03-01"]);
        for (date, entries) in view.iter() {
            for e in entries {
                assert_eq!(&e.entry_date[..10], date);
            }
        }
    }

    #[test]
    fn days_descend_and_times_ascend() {
        let view = GroupedView::from_entries(vec![
            entry(1, "2024-03-01", "17:00:00"),
            entry(2, "2024-03-15", "09:00:00"),
            entry(3, "2024-03-01", "08:15:00"),
            entry(4, "2024-03-09", "12:00:00"),
            entry(5, "2024-03-01", "12:30:00"),
        ]);
        assert_eq!(
            view.dates().collect::<Vec<_>>(),
            vec!["2024-03-15", "2024-03-09", "2024-03-01"]
        );
        let times: Vec<_> = view
            .get("2024-03-01")
            .expect("day")
            .iter()
            .map(|e| e.entry_time.as_str())
            .collect();
        assert_eq!(times, vec!["08:15:00", "12:30:00", "17:00:00"]);
        for (_, entries) in view.iter() {
            assert!(entries.windows(2).all(|w| w[0].entry_time <= w[1].entry_time));
        }
    }

    #[test]
    fn equal_times_keep_arrival_order() {
        let view = GroupedView::from_entries(vec![
            entry(9, "2024-03-01", "09:00:00"),
            entry(3, "2024-03-01", "09:00:00"),
            entry(5, "2024-03-01", "08:00:00"),
            entry(1, "2024-03-01", "09:00:00"),
        ]);
        let ids: Vec<_> = view.get("2024-03-01").expect("day").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 9, 3, 1]);
    }

    #[test]
    fn find_reports_position() {
        let view = GroupedView::from_entries(vec![
            entry(1, "2024-03-01", "09:00:00"),
            entry(2, "2024-03-01", "10:00:00"),
        ]);
        let (date, index, found) = view.find(2).expect("found");
        assert_eq!((date, index, found.id), ("2024-03-01", 1, 2));
        assert!(view.find(3).is_none());
        assert_eq!(view.entry_count(), 2);
    }

    #[test]
    fn in_flight_activity() {
        let mut in_flight = InFlight::default();
        assert!(in_flight.is_idle());
        in_flight.saving.insert(1);
        in_flight.deleting.insert(2);
        assert_eq!(in_flight.activity(1), Some(Activity::Saving));
        assert_eq!(in_flight.activity(2), Some(Activity::Deleting));
        assert_eq!(in_flight.activity(3), None);
        assert_eq!(Activity::Deleting.to_string(), "deleting");
    }
}
