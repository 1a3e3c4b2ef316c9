pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod dates;
pub mod export;
pub mod highlight;
pub mod markdown;
pub mod search;
pub mod storage;
pub mod ui;

pub use api::{ApiClient, ApiError, Entry, EntryBackend, NewEntry};
pub use app::{EntryForm, EntryStore, StoreError};
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
