//! Day export: a pure page layout step followed by PDF rendering.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::api::Entry;
use crate::dates;
use crate::markdown::strip_markdown;

pub mod pdf;

const MM_PER_PT: f32 = 25.4 / 72.0;
/// Rough Helvetica advance width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("rendering pdf: {0}")]
    Pdf(String),
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("export task failed: {0}")]
    Task(String),
}

/// Page metrics in millimetres (A4), font sizes in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub left_margin: f32,
    pub body_indent: f32,
    pub top_margin: f32,
    /// A line whose cursor reaches this goes to a fresh page.
    pub usable_height: f32,
    pub content_width: f32,
    pub title_size: f32,
    pub text_size: f32,
    pub entry_gap: f32,
    pub line_height: f32,
    pub entry_trailing_gap: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            left_margin: 20.0,
            body_indent: 30.0,
            top_margin: 20.0,
            usable_height: 280.0,
            content_width: 170.0,
            title_size: 16.0,
            text_size: 12.0,
            entry_gap: 10.0,
            line_height: 7.0,
            entry_trailing_gap: 5.0,
        }
    }
}

impl PageGeometry {
    /// Characters per wrapped body line at `text_size`.
    pub fn wrap_columns(&self) -> usize {
        let glyph = self.text_size * MM_PER_PT * AVG_GLYPH_EM;
        ((self.content_width / glyph).floor() as usize).max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOp {
    pub text: String,
    pub x: f32,
    /// Distance from the top edge of the page.
    pub y: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<TextOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub title: String,
    pub pages: Vec<Page>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

struct Cursor<'a> {
    geometry: &'a PageGeometry,
    pages: Vec<Page>,
    y: f32,
}

impl<'a> Cursor<'a> {
    fn new(geometry: &'a PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            y: geometry.top_margin,
        }
    }

    fn write(&mut self, text: impl Into<String>, x: f32, font_size: f32) {
        let op = TextOp {
            text: text.into(),
            x,
            y: self.y,
            font_size,
        };
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn advance(&mut self, by: f32) {
        self.y += by;
    }

    /// Advances one body line, breaking the page when the usable height is reached.
    fn next_line(&mut self) {
        self.y += self.geometry.line_height;
        if self.y >= self.geometry.usable_height {
            self.pages.push(Page::default());
            self.y = self.geometry.top_margin;
        }
    }
}

/// Lays out one day: formatted date as the title, then per entry its
/// `HH:MM` label and the markdown-stripped, wrapped description.
pub fn layout_day(date: &str, entries: &[Entry], geometry: &PageGeometry) -> DocumentLayout {
    let title = dates::format_date(date);
    let columns = geometry.wrap_columns();
    let mut cursor = Cursor::new(geometry);
    cursor.write(title.clone(), geometry.left_margin, geometry.title_size);

    for entry in entries {
        cursor.advance(geometry.entry_gap);
        cursor.write(entry.time_label(), geometry.left_margin, geometry.text_size);

        for line in wrap_text(&strip_markdown(&entry.description), columns) {
            cursor.next_line();
            cursor.write(line, geometry.body_indent, geometry.text_size);
        }

        cursor.advance(geometry.entry_trailing_gap);
    }

    DocumentLayout {
        title,
        pages: cursor.pages,
    }
}

/// Greedy word wrap by display width. Source newlines are kept, blank
/// lines included; words wider than a line are split on grapheme
/// boundaries.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        let mut width = 0;
        let mut emitted = false;
        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            if word_width > columns {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    emitted = true;
                }
                width = 0;
                for grapheme in word.graphemes(true) {
                    let g_width = grapheme.width();
                    if width + g_width > columns && !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                        emitted = true;
                        width = 0;
                    }
                    current.push_str(grapheme);
                    width += g_width;
                }
                continue;
            }
            let needed = if current.is_empty() {
                word_width
            } else {
                width + 1 + word_width
            };
            if needed > columns {
                lines.push(std::mem::take(&mut current));
                emitted = true;
                current.push_str(word);
                width = word_width;
            } else {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                width = needed;
            }
        }
        if !current.is_empty() || !emitted {
            lines.push(current);
        }
    }
    lines
}

pub fn export_file_name(date: &str) -> String {
    format!("diary-{date}.pdf")
}

/// Turns a day of entries into a saved document.
#[allow(async_fn_in_trait)]
pub trait Exporter {
    async fn export_day(&self, date: &str, entries: &[Entry]) -> Result<PathBuf, ExportError>;
}

/// Writes `diary-<date>.pdf` into a directory.
#[derive(Debug, Clone)]
pub struct PdfExporter {
    directory: PathBuf,
    geometry: PageGeometry,
}

impl PdfExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            geometry: PageGeometry::default(),
        }
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Exporter for PdfExporter {
    async fn export_day(&self, date: &str, entries: &[Entry]) -> Result<PathBuf, ExportError> {
        let date = dates::date_key(date).to_string();
        if dates::parse_date_key(&date).is_none() {
            return Err(ExportError::InvalidDate(date));
        }
        let path = self.directory.join(export_file_name(&date));
        let directory = self.directory.clone();
        let geometry = self.geometry;
        let entries = entries.to_vec();
        let target = path.clone();

        tokio::task::spawn_blocking(move || {
            let layout = layout_day(&date, &entries, &geometry);
            let bytes = pdf::render(&layout, &geometry)?;
            fs::create_dir_all(&directory).map_err(|source| ExportError::Write {
                path: directory.clone(),
                source,
            })?;
            fs::write(&target, bytes).map_err(|source| ExportError::Write {
                path: target.clone(),
                source,
            })?;
            tracing::info!(
                path = %target.display(),
                pages = layout.page_count(),
                "exported diary day"
            );
            Ok(())
        })
        .await
        .map_err(|err| ExportError::Task(err.to_string()))??;

        Ok(path)
    }
}
