use thiserror::Error;

use crate::api::ApiError;
use crate::export::ExportError;

use super::form::ValidationError;
use super::state::Activity;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("entry {0} is not in the current view")]
    NotFound(i64),
    #[error("no entry at position {index} of {date}")]
    NoSuchPosition { date: String, index: usize },
    #[error("entry {0} is not being edited")]
    NotEditing(i64),
    #[error("entry id cannot change from {expected} to {found}")]
    IdMismatch { expected: i64, found: i64 },
    #[error("entry {id} is busy ({activity})")]
    Busy { id: i64, activity: Activity },
    #[error("an export of {0} is already in progress")]
    ExportBusy(String),
    #[error("no delete is awaiting confirmation")]
    NoPendingDelete,
    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),
}
