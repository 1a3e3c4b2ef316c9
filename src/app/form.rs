use thiserror::Error;

use crate::api::NewEntry;
use crate::dates;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("description is required")]
    EmptyDescription,
    #[error("time is required")]
    MissingTime,
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Input fields for a new entry. Required fields are checked here, before
/// anything is sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryForm {
    pub date: String,
    pub time: String,
    pub description: String,
}

impl Default for EntryForm {
    fn default() -> Self {
        Self {
            date: dates::today_key(),
            time: dates::rounded_time_now(),
            description: String::new(),
        }
    }
}

impl EntryForm {
    pub fn new(
        date: impl Into<String>,
        time: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<NewEntry, ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        let time = self.time.trim();
        if time.is_empty() {
            return Err(ValidationError::MissingTime);
        }
        if dates::parse_clock(time).is_none() {
            return Err(ValidationError::InvalidTime(time.to_string()));
        }
        let date = self.date.trim();
        if dates::parse_date_key(date).is_none() {
            return Err(ValidationError::InvalidDate(date.to_string()));
        }
        Ok(NewEntry {
            date: date.to_string(),
            time: time.to_string(),
            description: self.description.clone(),
        })
    }

    /// After a successful submit: description cleared, time back to the
    /// rounded current time, date kept.
    pub fn reset_after_submit(&mut self) {
        self.description.clear();
        self.time = dates::rounded_time_now();
    }

    /// Appends a pasted image as a data-URI markdown image on its own line.
    pub fn append_image(&mut self, mime: &str, bytes: &[u8]) {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.description
            .push_str(&format!("\n![image](data:{mime};base64,{encoded})"));
    }
}
