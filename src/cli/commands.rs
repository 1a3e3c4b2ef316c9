use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};

use super::Commands;
use crate::api::EntryBackend;
use crate::app::{EntryForm, EntryStore, StoreError};
use crate::config::{AppConfig, ThemeName};
use crate::dates;
use crate::export::PdfExporter;
use crate::storage::prefs::{CONTENT_BLURRED_KEY, THEME_KEY};
use crate::storage::PreferenceStore;
use crate::ui::{self, RenderOptions};

/// Everything a command needs: the entry store over the selected backend
/// plus presentation settings.
pub struct Session<B> {
    pub store: EntryStore<B>,
    pub config: AppConfig,
    pub prefs: PreferenceStore,
    pub export_dir: PathBuf,
    /// Stdin is a terminal, so prompts can be answered.
    pub interactive: bool,
    pub color: bool,
}

impl<B: EntryBackend> Session<B> {
    fn render_options(&self, query: Option<&str>, expand: bool) -> RenderOptions {
        RenderOptions {
            blurred: self.prefs.get(CONTENT_BLURRED_KEY, false),
            theme: self.prefs.get(THEME_KEY, ThemeName::default()),
            color: self.color,
            preview_chars: self.config.display.preview_chars,
            expand,
            query: query.unwrap_or_default().to_string(),
        }
    }

    async fn open_month(&self, month: Option<&str>) -> Result<String> {
        let month = month
            .map(str::to_string)
            .unwrap_or_else(dates::current_month_key);
        self.store
            .set_month(&month)
            .await
            .with_context(|| format!("loading entries for {month}"))?;
        Ok(month)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Month to show as YYYY-MM (defaults to the current month)
    #[arg(long)]
    pub month: Option<String>,
    /// Only show entries whose text or time contains this
    #[arg(long, short)]
    pub query: Option<String>,
    /// Print long entries in full instead of a preview
    #[arg(long)]
    pub expand: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    /// Entry date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
    /// Entry time as HH:MM (defaults to now, rounded up to the quarter hour)
    #[arg(long)]
    pub time: Option<String>,
    /// Markdown text. If omitted, reads from stdin.
    #[arg(long, short)]
    pub description: Option<String>,
    /// Attach an image file as an inline data URI
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Entry identifier
    pub id: i64,
    /// Month containing the entry (defaults to the current month)
    #[arg(long)]
    pub month: Option<String>,
    /// New time as HH:MM
    #[arg(long)]
    pub time: Option<String>,
    /// New markdown text
    #[arg(long, short)]
    pub description: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteArgs {
    /// Entry identifier
    pub id: i64,
    /// Month containing the entry (defaults to the current month)
    #[arg(long)]
    pub month: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Day to export as YYYY-MM-DD
    pub date: String,
    /// Month to load (defaults to the month of the date)
    #[arg(long)]
    pub month: Option<String>,
    /// Export only entries matching this search
    #[arg(long, short)]
    pub query: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Entry identifier
    pub id: i64,
    /// Month containing the entry (defaults to the current month)
    #[arg(long)]
    pub month: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
    Toggle,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeChoice {
    Light,
    Dark,
    Toggle,
}

#[derive(Args, Debug, Clone)]
pub struct BlurArgs {
    #[arg(value_enum, default_value = "toggle")]
    pub state: Switch,
}

#[derive(Args, Debug, Clone)]
pub struct ThemeArgs {
    #[arg(value_enum, default_value = "toggle")]
    pub theme: ThemeChoice,
}

pub async fn execute<B: EntryBackend>(session: &Session<B>, command: Commands) -> Result<()> {
    match command {
        Commands::List(args) => print(run_list(session, &args).await),
        Commands::Add(mut args) => {
            if args.description.is_none() {
                args.description = read_stdin()?;
            }
            print(run_add(session, &args).await)
        }
        Commands::Edit(args) => print(run_edit(session, &args).await),
        Commands::Delete(args) => {
            let interactive = session.interactive;
            let output = run_delete(session, &args, |question| {
                if !interactive {
                    bail!("refusing to delete without confirmation; pass --yes");
                }
                confirm(question)
            })
            .await;
            print(output)
        }
        Commands::Export(args) => print(run_export(session, &args).await),
        Commands::Show(args) => print(run_show(session, &args).await),
        Commands::Blur(args) => print(run_blur(&session.prefs, &args)),
        Commands::Theme(args) => print(run_theme(&session.prefs, &args)),
    }
}

pub fn print(output: Result<String>) -> Result<()> {
    let output = output?;
    let mut stdout = io::stdout().lock();
    write!(stdout, "{output}")?;
    if !output.ends_with('\n') {
        writeln!(stdout)?;
    }
    Ok(())
}

pub async fn run_list<B: EntryBackend>(session: &Session<B>, args: &ListArgs) -> Result<String> {
    let month = args
        .month
        .clone()
        .unwrap_or_else(dates::current_month_key);
    // a failed load is shown in the listing itself
    if let Err(err) = session.store.set_month(&month).await {
        if matches!(err, StoreError::InvalidMonth(_)) {
            return Err(err.into());
        }
        tracing::warn!(month = %month, error = %err, "listing without entries");
    }
    let query = args.query.as_deref();
    let view = session.store.filtered(query.unwrap_or_default());
    let state = session.store.snapshot();
    Ok(ui::render_view(
        &view,
        &state,
        &session.render_options(query, args.expand),
    ))
}

pub async fn run_add<B: EntryBackend>(session: &Session<B>, args: &AddArgs) -> Result<String> {
    let mut form = EntryForm::default();
    if let Some(date) = &args.date {
        form.date = date.trim().to_string();
    }
    if let Some(time) = &args.time {
        form.time = time.trim().to_string();
    }
    form.description = args
        .description
        .clone()
        .context("an entry needs a description: pass --description or pipe text on stdin")?;
    if let Some(path) = &args.image {
        let mime = image_mime(path)?;
        let bytes = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        form.append_image(mime, &bytes);
    }

    let created = session.store.add(&mut form).await?;
    Ok(format!(
        "Added entry #{} on {} at {}",
        created.id,
        dates::format_date(created.date_key()),
        dates::format_time_12h(&created.entry_time)
    ))
}

pub async fn run_edit<B: EntryBackend>(session: &Session<B>, args: &EditArgs) -> Result<String> {
    if args.time.is_none() && args.description.is_none() {
        bail!("nothing to change: pass --time and/or --description");
    }
    let month = session.open_month(args.month.as_deref()).await?;
    let store = &session.store;
    store
        .begin_edit(args.id)
        .with_context(|| format!("entry #{} is not in {month}", args.id))?;

    let (date, index, mut draft) = match store.groups().find(args.id) {
        Some((date, index, entry)) => (date.to_string(), index, entry.clone()),
        None => bail!("entry #{} disappeared while editing", args.id),
    };
    if let Some(time) = &args.time {
        let time = time.trim();
        if dates::parse_clock(time).is_none() {
            store.cancel_edit();
            bail!("invalid time '{time}', expected HH:MM");
        }
        draft.entry_time = time.to_string();
    }
    if let Some(description) = &args.description {
        if description.trim().is_empty() {
            store.cancel_edit();
            bail!("description cannot be empty");
        }
        draft.description = description.clone();
    }
    store.local_update(&date, index, draft)?;

    let saved = store.confirm_edit(args.id).await?;
    Ok(format!(
        "Updated entry #{} on {} at {}",
        saved.id,
        dates::format_date(saved.date_key()),
        dates::format_time_12h(&saved.entry_time)
    ))
}

/// Deletes after `confirm` accepts the prompt; `--yes` skips the prompt.
pub async fn run_delete<B, F>(session: &Session<B>, args: &DeleteArgs, confirm: F) -> Result<String>
where
    B: EntryBackend,
    F: FnOnce(&str) -> Result<bool>,
{
    session.open_month(args.month.as_deref()).await?;
    let store = &session.store;
    let pending = store.request_delete(args.id)?;
    if !args.yes {
        let accepted = match confirm(&ui::render_delete_prompt(&pending)) {
            Ok(accepted) => accepted,
            Err(err) => {
                store.cancel_delete();
                return Err(err);
            }
        };
        if !accepted {
            store.cancel_delete();
            return Ok("Cancelled.".to_string());
        }
    }
    let id = store.confirm_delete().await?;
    Ok(format!("Deleted entry #{id}"))
}

pub async fn run_export<B: EntryBackend>(
    session: &Session<B>,
    args: &ExportArgs,
) -> Result<String> {
    let date = args.date.trim();
    if dates::parse_date_key(date).is_none() {
        bail!("invalid date '{date}', expected YYYY-MM-DD");
    }
    let month = args.month.as_deref().unwrap_or(dates::month_of(date));
    session.open_month(Some(month)).await?;

    let view = session.store.filtered(args.query.as_deref().unwrap_or_default());
    let Some(entries) = view.get(date) else {
        bail!("no entries on {date}");
    };
    let exporter = PdfExporter::new(&session.export_dir);
    let path = session.store.export(date, entries, &exporter).await?;
    Ok(format!(
        "Exported {} entries from {} to {}",
        entries.len(),
        dates::format_date(date),
        path.display()
    ))
}

pub async fn run_show<B: EntryBackend>(session: &Session<B>, args: &ShowArgs) -> Result<String> {
    let month = session.open_month(args.month.as_deref()).await?;
    let view = session.store.groups();
    let Some((_, _, entry)) = view.find(args.id) else {
        bail!("entry #{} is not in {month}", args.id);
    };
    Ok(ui::render_entry_detail(entry, &session.render_options(None, true)))
}

pub fn run_blur(prefs: &PreferenceStore, args: &BlurArgs) -> Result<String> {
    let current = prefs.get(CONTENT_BLURRED_KEY, false);
    let blurred = match args.state {
        Switch::On => true,
        Switch::Off => false,
        Switch::Toggle => !current,
    };
    prefs.set(CONTENT_BLURRED_KEY, &blurred);
    Ok(format!(
        "Content blur {}",
        if blurred { "on" } else { "off" }
    ))
}

pub fn run_theme(prefs: &PreferenceStore, args: &ThemeArgs) -> Result<String> {
    let current: ThemeName = prefs.get(THEME_KEY, ThemeName::default());
    let theme = match args.theme {
        ThemeChoice::Light => ThemeName::Light,
        ThemeChoice::Dark => ThemeName::Dark,
        ThemeChoice::Toggle => current.toggled(),
    };
    prefs.set(THEME_KEY, &theme);
    Ok(format!("Theme: {theme}"))
}

fn image_mime(path: &Path) -> Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => bail!("unsupported image type: {}", path.display()),
    };
    Ok(mime)
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question}\n[y/N]"))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}: ")?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageOptions;
    use crate::storage::{self, LocalBackend};
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn setup_session() -> TestResult<(TempDir, Session<LocalBackend>)> {
        let dir = TempDir::new()?;
        let handle = storage::init(&StorageOptions {
            database_path: dir.path().join("diary.db"),
            ..StorageOptions::default()
        })?;
        let session = Session {
            store: EntryStore::new(LocalBackend::new(handle), "2024-03"),
            config: AppConfig::default(),
            prefs: PreferenceStore::in_memory(),
            export_dir: dir.path().join("exports"),
            interactive: false,
            color: false,
        };
        Ok((dir, session))
    }

    fn add_args(date: &str, time: &str, description: &str) -> AddArgs {
        AddArgs {
            date: Some(date.into()),
            time: Some(time.into()),
            description: Some(description.into()),
            image: None,
        }
    }

    fn march() -> ListArgs {
        ListArgs {
            month: Some("2024-03".into()),
            ..ListArgs::default()
        }
    }

    #[tokio::test]
    async fn add_then_list_and_show() -> TestResult {
        let (_dir, session) = setup_session()?;
        let added = run_add(
            &session,
            &add_args("2024-03-01", "09:00", "Standup with **team**"),
        )
        .await?;
        assert_eq!(added, "Added entry #1 on Friday, March 1, 2024 at 9:00 AM");
        run_add(&session, &add_args("2024-03-04", "14:30", "Planning")).await?;

        let listing = run_list(&session, &march()).await?;
        let monday = listing.find("Monday, March 4, 2024").expect("monday");
        let friday = listing.find("Friday, March 1, 2024").expect("friday");
        assert!(monday < friday);
        assert!(listing.contains("2:30 PM"));

        let filtered = run_list(
            &session,
            &ListArgs {
                query: Some("TEAM".into()),
                ..march()
            },
        )
        .await?;
        assert!(filtered.contains("«team»"));
        assert!(!filtered.contains("Planning"));

        let shown = run_show(
            &session,
            &ShowArgs {
                id: 1,
                month: Some("2024-03".into()),
            },
        )
        .await?;
        assert!(shown.contains("Standup with **team**"));
        Ok(())
    }

    #[tokio::test]
    async fn add_requires_description() -> TestResult {
        let (_dir, session) = setup_session()?;
        let missing = AddArgs {
            description: None,
            ..add_args("2024-03-01", "09:00", "")
        };
        assert!(run_add(&session, &missing).await.is_err());
        let blank = add_args("2024-03-01", "09:00", "   ");
        let err = run_add(&session, &blank).await.expect_err("blank rejected");
        assert!(err.to_string().contains("description is required"));
        Ok(())
    }

    #[tokio::test]
    async fn add_attaches_image() -> TestResult {
        let (dir, session) = setup_session()?;
        let image = dir.path().join("shot.PNG");
        fs::write(&image, b"png")?;
        let args = AddArgs {
            image: Some(image),
            ..add_args("2024-03-01", "09:00", "Screenshot")
        };
        run_add(&session, &args).await?;
        let view = session.store.groups();
        let (_, _, entry) = view.find(1).expect("entry");
        assert_eq!(
            entry.description,
            "Screenshot\n![image](data:image/png;base64,cG5n)"
        );
        assert!(image_mime(Path::new("notes.txt")).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn edit_changes_time_and_text() -> TestResult {
        let (_dir, session) = setup_session()?;
        run_add(&session, &add_args("2024-03-01", "09:00", "Standup")).await?;
        let edited = run_edit(
            &session,
            &EditArgs {
                id: 1,
                month: Some("2024-03".into()),
                time: Some("10:15".into()),
                description: Some("Standup, moved".into()),
            },
        )
        .await?;
        assert_eq!(edited, "Updated entry #1 on Friday, March 1, 2024 at 10:15 AM");
        assert_eq!(session.store.editing_id(), None);

        let err = run_edit(
            &session,
            &EditArgs {
                id: 1,
                month: Some("2024-03".into()),
                time: Some("25:99".into()),
                description: None,
            },
        )
        .await
        .expect_err("bad time");
        assert!(err.to_string().contains("invalid time"));
        assert_eq!(session.store.editing_id(), None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_honours_confirmation() -> TestResult {
        let (_dir, session) = setup_session()?;
        run_add(&session, &add_args("2024-03-01", "09:00", "Standup")).await?;
        let args = DeleteArgs {
            id: 1,
            month: Some("2024-03".into()),
            yes: false,
        };

        let mut asked = String::new();
        let declined = run_delete(&session, &args, |question| {
            asked = question.to_string();
            Ok(false)
        })
        .await?;
        assert_eq!(declined, "Cancelled.");
        assert!(asked.starts_with("Delete the entry from Friday, March 1, 2024 at 9:00 AM?"));
        assert!(session.store.groups().contains(1));
        assert_eq!(session.store.pending_delete(), None);

        let deleted = run_delete(&session, &args, |_| Ok(true)).await?;
        assert_eq!(deleted, "Deleted entry #1");
        assert!(session.store.groups().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn export_writes_day_pdf() -> TestResult {
        let (dir, session) = setup_session()?;
        run_add(&session, &add_args("2024-03-01", "09:00", "Standup")).await?;
        let output = run_export(
            &session,
            &ExportArgs {
                date: "2024-03-01".into(),
                ..ExportArgs::default()
            },
        )
        .await?;
        assert!(output.starts_with("Exported 1 entries from Friday, March 1, 2024"));
        assert!(dir.path().join("exports").join("diary-2024-03-01.pdf").exists());

        let missing = run_export(
            &session,
            &ExportArgs {
                date: "2024-03-02".into(),
                ..ExportArgs::default()
            },
        )
        .await;
        assert!(missing.is_err());
        Ok(())
    }

    #[test]
    fn blur_and_theme_preferences_toggle() -> TestResult {
        let prefs = PreferenceStore::in_memory();
        assert_eq!(
            run_blur(&prefs, &BlurArgs { state: Switch::Toggle })?,
            "Content blur on"
        );
        assert!(prefs.get(CONTENT_BLURRED_KEY, false));
        assert_eq!(
            run_blur(&prefs, &BlurArgs { state: Switch::Off })?,
            "Content blur off"
        );

        assert_eq!(
            run_theme(&prefs, &ThemeArgs { theme: ThemeChoice::Toggle })?,
            "Theme: dark"
        );
        assert_eq!(prefs.get(THEME_KEY, ThemeName::Light), ThemeName::Dark);
        Ok(())
    }
}
