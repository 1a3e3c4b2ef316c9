use crate::api::Entry;
use crate::app::GroupedView;

/// Case-insensitive substring filter over descriptions, plus a plain
/// substring match on the raw `entry_time`.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    raw: String,
    lowered: String,
}

impl EntryFilter {
    pub fn new(query: &str) -> Self {
        Self {
            raw: query.to_string(),
            lowered: query.to_lowercase(),
        }
    }

    pub fn query(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        entry.description.to_lowercase().contains(&self.lowered)
            || entry.entry_time.contains(&self.raw)
    }

    /// Keeps matching entries in their existing order and drops groups left
    /// empty. An empty query returns the view as-is.
    pub fn apply(&self, view: &GroupedView) -> GroupedView {
        if self.is_empty() {
            return view.clone();
        }
        view.retain_entries(|entry| self.matches(entry))
    }
}

pub fn filter_groups(view: &GroupedView, query: &str) -> GroupedView {
    EntryFilter::new(query).apply(view)
}
