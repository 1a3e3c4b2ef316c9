use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS diary_entries (
            id INTEGER PRIMARY KEY,
            entry_date TEXT NOT NULL,
            entry_time TEXT NOT NULL,
            description TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS diary_entries_date_time
            ON diary_entries (entry_date, entry_time);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
