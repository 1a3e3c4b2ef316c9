use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::api::{ApiError, Entry, EntryBackend, NewEntry};
use crate::config::StorageOptions;
use crate::dates;

pub mod prefs;
mod schema;

pub use prefs::PreferenceStore;

const SELECT_ENTRY: &str = "SELECT id, entry_date, entry_time, description FROM diary_entries";

/// Filter for listing entries. `month` wins over `date` when both are given,
/// matching the REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryQuery {
    All,
    Date(String),
    Month(String),
}

impl EntryQuery {
    pub fn from_params(date: Option<&str>, month: Option<&str>) -> Self {
        match (month, date) {
            (Some(month), _) if !month.is_empty() => EntryQuery::Month(month.to_string()),
            (_, Some(date)) if !date.is_empty() => EntryQuery::Date(date.to_string()),
            _ => EntryQuery::All,
        }
    }
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>> {
        self.with_connection(|conn| {
            let (clause, param) = match query {
                EntryQuery::All => ("", None),
                EntryQuery::Date(date) => (" WHERE entry_date = ?1", Some(date.as_str())),
                EntryQuery::Month(month) => {
                    (" WHERE substr(entry_date, 1, 7) = ?1", Some(month.as_str()))
                }
            };
            let sql = format!("{SELECT_ENTRY}{clause} ORDER BY entry_time, id");
            let mut stmt = conn.prepare(&sql).context("preparing entry listing")?;
            let rows = match param {
                Some(value) => stmt.query_map([value], map_entry)?,
                None => stmt.query_map([], map_entry)?,
            };
            let entries = rows
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("reading entry rows")?;
            Ok(entries)
        })
    }

    pub fn fetch_entry(&self, id: i64) -> Result<Option<Entry>> {
        self.with_connection(|conn| fetch_entry_with(conn, id))
    }

    pub fn create_entry(&self, entry: &NewEntry) -> Result<Entry> {
        let date = normalize_date(&entry.date)?;
        let time = normalize_time(&entry.time)?;
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO diary_entries (entry_date, entry_time, description)
                 VALUES (?1, ?2, ?3)",
                params![date, time, entry.description],
            )
            .context("inserting entry")?;
            let id = conn.last_insert_rowid();
            fetch_entry_with(conn, id)?.with_context(|| format!("entry {id} vanished after insert"))
        })
    }

    /// Rewrites time and description; the date of an entry never changes.
    pub fn update_entry(&self, id: i64, entry: &NewEntry) -> Result<Option<Entry>> {
        let time = normalize_time(&entry.time)?;
        self.with_connection(|conn| {
            let updated = conn
                .execute(
                    "UPDATE diary_entries SET entry_time = ?1, description = ?2 WHERE id = ?3",
                    params![time, entry.description, id],
                )
                .context("updating entry")?;
            if updated == 0 {
                return Ok(None);
            }
            fetch_entry_with(conn, id)
        })
    }

    /// Returns whether a row was removed; deleting a missing id is not an error.
    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM diary_entries WHERE id = ?1", params![id])
                .context("deleting entry")?;
            Ok(removed > 0)
        })
    }
}

/// [`EntryBackend`] over the local database. Each call runs on the blocking
/// pool with its own connection.
#[derive(Clone)]
pub struct LocalBackend {
    storage: StorageHandle,
}

impl LocalBackend {
    pub fn new(storage: StorageHandle) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&StorageHandle) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || f(&storage))
            .await
            .map_err(|err| ApiError::Local(anyhow::Error::new(err).context("storage task failed")))?
            .map_err(|err| {
                tracing::error!(?err, "local storage operation failed");
                ApiError::Local(err)
            })
    }
}

impl EntryBackend for LocalBackend {
    async fn fetch_entries_by_month(&self, month: &str) -> Result<Vec<Entry>, ApiError> {
        let query = EntryQuery::Month(month.to_string());
        self.run_blocking(move |storage| storage.fetch_entries(&query))
            .await
    }

    async fn add_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError> {
        let entry = entry.clone();
        self.run_blocking(move |storage| storage.create_entry(&entry))
            .await
    }

    async fn update_entry(&self, id: i64, entry: &NewEntry) -> Result<Entry, ApiError> {
        let entry = entry.clone();
        self.run_blocking(move |storage| storage.update_entry(id, &entry))
            .await?
            .ok_or(ApiError::NotFound(id))
    }

    async fn delete_entry(&self, id: i64) -> Result<(), ApiError> {
        let removed = self
            .run_blocking(move |storage| storage.delete_entry(id))
            .await?;
        if !removed {
            tracing::debug!(id, "delete of missing entry treated as success");
        }
        Ok(())
    }
}

pub fn init(storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &storage.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))
        .context("setting busy timeout")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    Ok(())
}

fn fetch_entry_with(conn: &Connection, id: i64) -> Result<Option<Entry>> {
    conn.query_row(&format!("{SELECT_ENTRY} WHERE id = ?1"), [id], map_entry)
        .optional()
        .with_context(|| format!("loading entry {id}"))
}

fn map_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        entry_date: row.get(1)?,
        entry_time: row.get(2)?,
        description: row.get(3)?,
    })
}

fn normalize_date(raw: &str) -> Result<String> {
    let key = dates::date_key(raw.trim());
    if dates::parse_date_key(key).is_none() {
        bail!("invalid entry date '{raw}'");
    }
    Ok(key.to_string())
}

/// Stores times as `HH:MM:SS`; `HH:MM` input gets zero seconds.
fn normalize_time(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let clock = dates::time_label(raw);
    if dates::parse_clock(clock).is_none() {
        bail!("invalid entry time '{raw}'");
    }
    match raw.len() {
        5 => Ok(format!("{raw}:00")),
        8 if raw.as_bytes()[5] == b':' && raw[6..].bytes().all(|b| b.is_ascii_digit()) => {
            Ok(raw.to_string())
        }
        _ => bail!("invalid entry time '{raw}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_storage() -> Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let options = StorageOptions {
            database_path: temp.path().join("data/diary.db"),
            ..StorageOptions::default()
        };
        let storage = init(&options)?;
        Ok((temp, storage))
    }

    fn new_entry(date: &str, time: &str, description: &str) -> NewEntry {
        NewEntry {
            date: date.into(),
            time: time.into(),
            description: description.into(),
        }
    }

    #[test]
    fn create_echoes_full_record() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let created = storage.create_entry(&new_entry("2024-03-01", "09:00", "Hello"))?;
        assert!(created.id > 0);
        assert_eq!(created.entry_date, "2024-03-01");
        assert_eq!(created.entry_time, "09:00:00");
        assert_eq!(created.description, "Hello");
        Ok(())
    }

    #[test]
    fn month_listing_is_ordered_by_time() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.create_entry(&new_entry("2024-03-02", "14:00", "afternoon"))?;
        storage.create_entry(&new_entry("2024-03-01", "09:00", "morning"))?;
        storage.create_entry(&new_entry("2024-04-01", "08:00", "next month"))?;
        storage.create_entry(&new_entry("2024-03-02", "07:30", "early"))?;

        let march = storage.fetch_entries(&EntryQuery::Month("2024-03".into()))?;
        let times: Vec<_> = march.iter().map(|e| e.entry_time.as_str()).collect();
        assert_eq!(times, vec!["07:30:00", "09:00:00", "14:00:00"]);
        assert!(march.iter().all(|e| e.entry_date.starts_with("2024-03")));
        Ok(())
    }

    #[test]
    fn month_takes_precedence_over_date() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.create_entry(&new_entry("2024-03-01", "09:00", "march"))?;
        storage.create_entry(&new_entry("2024-04-01", "09:00", "april"))?;

        let query = EntryQuery::from_params(Some("2024-03-01"), Some("2024-04"));
        assert_eq!(query, EntryQuery::Month("2024-04".into()));
        let entries = storage.fetch_entries(&query)?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "april");

        let by_date = storage.fetch_entries(&EntryQuery::from_params(Some("2024-03-01"), None))?;
        assert_eq!(by_date.len(), 1);
        assert_eq!(by_date[0].description, "march");
        Ok(())
    }

    #[test]
    fn update_keeps_date_and_rewrites_time() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let created = storage.create_entry(&new_entry("2024-03-01", "09:00", "draft"))?;
        let updated = storage
            .update_entry(created.id, &new_entry("2030-01-01", "10:15", "final"))?
            .expect("entry present");
        assert_eq!(updated.entry_date, "2024-03-01");
        assert_eq!(updated.entry_time, "10:15:00");
        assert_eq!(updated.description, "final");

        assert!(storage
            .update_entry(9_999, &new_entry("2024-03-01", "10:15", "x"))?
            .is_none());
        Ok(())
    }

    #[test]
    fn delete_is_idempotent() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let created = storage.create_entry(&new_entry("2024-03-01", "09:00", "bye"))?;
        assert!(storage.delete_entry(created.id)?);
        assert!(!storage.delete_entry(created.id)?);
        assert!(storage.fetch_entry(created.id)?.is_none());
        Ok(())
    }

    #[test]
    fn rejects_malformed_date_and_time() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        assert!(storage
            .create_entry(&new_entry("03/01/2024", "09:00", "x"))
            .is_err());
        assert!(storage
            .create_entry(&new_entry("2024-03-01", "9am", "x"))
            .is_err());
        assert!(storage
            .create_entry(&new_entry("2024-03-01", "09:00:xx", "x"))
            .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn local_backend_maps_missing_update_to_not_found() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let backend = LocalBackend::new(storage);
        let err = backend
            .update_entry(42, &new_entry("2024-03-01", "09:00", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(42)));
        backend.delete_entry(42).await?;
        Ok(())
    }
}
