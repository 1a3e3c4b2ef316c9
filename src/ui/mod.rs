//! Plain-text rendering of the grouped view, optionally coloured with
//! crossterm styles.

use crossterm::style::{Color, Stylize};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::api::Entry;
use crate::app::{Activity, GroupedView, PendingDelete, ViewState};
use crate::config::{DisplayOptions, Palette, ThemeName};
use crate::dates;
use crate::highlight::{build_highlight_regex, mark_matches};

const BODY_INDENT: &str = "    ";
const MASK: &str = "░";
const PLAIN_MARK_OPEN: &str = "«";
const PLAIN_MARK_CLOSE: &str = "»";

/// Presentation switches passed explicitly to every render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub blurred: bool,
    pub theme: ThemeName,
    pub color: bool,
    pub preview_chars: usize,
    pub expand: bool,
    pub query: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_display(&DisplayOptions::default())
    }
}

impl RenderOptions {
    pub fn from_display(display: &DisplayOptions) -> Self {
        Self {
            blurred: false,
            theme: ThemeName::default(),
            color: display.color,
            preview_chars: display.preview_chars,
            expand: false,
            query: String::new(),
        }
    }
}

struct Painter {
    palette: Palette,
    color: bool,
}

impl Painter {
    fn new(options: &RenderOptions) -> Self {
        Self {
            palette: options.theme.palette(),
            color: options.color,
        }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn strong(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn highlight(&self, text: &str, regex: Option<&Regex>) -> String {
        let Some(regex) = regex else {
            return text.to_string();
        };
        if !self.color {
            return mark_matches(text, Some(regex), PLAIN_MARK_OPEN, PLAIN_MARK_CLOSE);
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for found in regex.find_iter(text) {
            out.push_str(&text[last..found.start()]);
            out.push_str(&self.strong(found.as_str(), self.palette.highlight));
            last = found.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

/// Renders a month: title, load status, then each day with its entries.
pub fn render_view(view: &GroupedView, state: &ViewState, options: &RenderOptions) -> String {
    let painter = Painter::new(options);
    let regex = build_highlight_regex(&options.query);
    let mut lines = vec![painter.strong(&dates::format_month(&state.month), painter.palette.text)];

    if state.loading {
        lines.push(painter.paint("Loading...", painter.palette.muted));
    }
    if let Some(error) = &state.error {
        lines.push(painter.paint(&format!("Error: {error}"), painter.palette.error));
    }
    if view.is_empty() && !state.loading {
        let empty = if options.query.is_empty() {
            "No entries found.".to_string()
        } else {
            format!("No entries match \"{}\".", options.query)
        };
        lines.push(painter.paint(&empty, painter.palette.muted));
    }

    for (date, entries) in view.iter() {
        lines.push(String::new());
        let mut header = painter.strong(&dates::format_date(date), painter.palette.date);
        if state.is_exporting(date) {
            header.push(' ');
            header.push_str(&painter.paint("[exporting...]", painter.palette.busy));
        }
        lines.push(header);
        for entry in entries {
            render_entry_into(&mut lines, entry, state, options, &painter, regex.as_ref());
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_entry_into(
    lines: &mut Vec<String>,
    entry: &Entry,
    state: &ViewState,
    options: &RenderOptions,
    painter: &Painter,
    regex: Option<&Regex>,
) {
    let editing = state.editing_id() == Some(entry.id);
    let mut header = format!(
        "  {}  #{}  {}",
        painter.strong(&dates::format_time_12h(&entry.entry_time), painter.palette.time),
        entry.id,
        painter.paint(&counts_label(&entry.description), painter.palette.muted),
    );
    for activity in activities(state, entry.id) {
        let label = match activity {
            Activity::Editing => format!("[{activity}]"),
            _ => format!("[{activity}...]"),
        };
        header.push(' ');
        header.push_str(&painter.paint(&label, painter.palette.busy));
    }
    lines.push(header);

    let body = preview(&entry.description, options.preview_chars, options.expand || editing);
    let body = if options.blurred {
        mask(&body)
    } else {
        painter.highlight(&body, regex)
    };
    for line in body.lines() {
        lines.push(format!("{BODY_INDENT}{line}"));
    }
}

fn activities(state: &ViewState, id: i64) -> Vec<Activity> {
    let mut out = Vec::new();
    if state.editing_id() == Some(id) {
        out.push(Activity::Editing);
    }
    out.extend(state.in_flight.activity(id));
    out
}

/// "N words • M characters"
pub fn counts_label(description: &str) -> String {
    let words = description.split_whitespace().count();
    let chars = description.chars().count();
    format!("{words} words • {chars} characters")
}

/// First `limit` characters plus `...` when the text is longer and not expanded.
pub fn preview(description: &str, limit: usize, expanded: bool) -> String {
    if expanded || description.chars().count() <= limit {
        return description.to_string();
    }
    let mut out: String = description.chars().take(limit).collect();
    out.push_str("...");
    out
}

/// Hides content while keeping its shape: whitespace survives, every other
/// grapheme becomes a block.
pub fn mask(text: &str) -> String {
    text.graphemes(true)
        .map(|g| {
            if g.chars().all(char::is_whitespace) {
                g
            } else {
                MASK
            }
        })
        .collect()
}

/// Full entry with its raw markdown, for copying out of the terminal.
pub fn render_entry_detail(entry: &Entry, options: &RenderOptions) -> String {
    let painter = Painter::new(options);
    format!(
        "{} {}  #{}\n{}\n\n{}\n",
        painter.strong(&dates::format_date(entry.date_key()), painter.palette.date),
        painter.strong(&dates::format_time_12h(&entry.entry_time), painter.palette.time),
        entry.id,
        painter.paint(&counts_label(&entry.description), painter.palette.muted),
        entry.description,
    )
}

pub fn render_delete_prompt(pending: &PendingDelete) -> String {
    let mut prompt = format!(
        "Delete the entry from {} at {}?",
        dates::format_date(&pending.date),
        dates::format_time_12h(&pending.time)
    );
    if !pending.preview.is_empty() {
        prompt.push_str(&format!("\n{BODY_INDENT}{}", pending.preview));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, date: &str, time: &str, description: &str) -> Entry {
        Entry {
            id,
            entry_date: date.into(),
            entry_time: time.into(),
            description: description.into(),
        }
    }

    fn plain() -> RenderOptions {
        RenderOptions {
            color: false,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn renders_month_with_markers_and_highlight() {
        let view = GroupedView::from_entries(vec![
            entry(1, "2024-03-01", "17:00:00", "Wrap up **notes**\n- send summary"),
            entry(2, "2024-03-01T00:00:00.000Z", "09:00:00", "Standup with team"),
            entry(3, "2024-03-04", "13:30:00", "Planning"),
        ]);
        let mut state = ViewState::new("2024-03");
        state.view = view.clone();
        state.editing = view.find(1).map(|(_, _, original)| crate::app::EditSession {
            id: 1,
            original: original.clone(),
        });
        state.in_flight.deleting.insert(3);
        let options = RenderOptions {
            query: "team".into(),
            ..plain()
        };

        let rendered = render_view(&view, &state, &options);

        insta::assert_snapshot!(rendered.trim_end(), @r"
        March 2024

        Monday, March 4, 2024
          1:30 PM  #3  1 words • 8 characters [deleting...]
            Planning

        Friday, March 1, 2024
          9:00 AM  #2  3 words • 17 characters
            Standup with «team»
          5:00 PM  #1  6 words • 32 characters [editing]
            Wrap up **notes**
            - send summary
        ");
    }

    #[test]
    fn empty_and_failed_views() {
        let mut state = ViewState::new("2024-03");
        state.error = Some("HTTP error 500".into());
        let rendered = render_view(&GroupedView::default(), &state, &plain());
        assert_eq!(rendered, "March 2024\nError: HTTP error 500\nNo entries found.\n");

        let options = RenderOptions {
            query: "zzz".into(),
            ..plain()
        };
        let rendered = render_view(&GroupedView::default(), &ViewState::new("2024-03"), &options);
        assert!(rendered.contains("No entries match \"zzz\"."));
    }

    #[test]
    fn long_descriptions_are_truncated_unless_expanded() {
        assert_eq!(preview("abcdefgh", 5, false), "abcde...");
        assert_eq!(preview("abcdefgh", 5, true), "abcdefgh");
        assert_eq!(preview("abcde", 5, false), "abcde");

        let long = "x".repeat(301);
        let view = GroupedView::from_entries(vec![entry(1, "2024-03-01", "09:00:00", &long)]);
        let state = ViewState::new("2024-03");
        let rendered = render_view(&view, &state, &plain());
        assert!(rendered.contains(&format!("{}...", "x".repeat(300))));
    }

    #[test]
    fn blur_masks_content_but_not_layout() {
        assert_eq!(mask("ab c\nd"), "░░ ░\n░");
        let view = GroupedView::from_entries(vec![entry(1, "2024-03-01", "09:00:00", "secret")]);
        let options = RenderOptions {
            blurred: true,
            ..plain()
        };
        let rendered = render_view(&view, &ViewState::new("2024-03"), &options);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("░░░░░░"));
    }

    #[test]
    fn colour_output_wraps_highlights_in_escape_codes() {
        let options = RenderOptions {
            color: true,
            query: "team".into(),
            ..RenderOptions::default()
        };
        let view = GroupedView::from_entries(vec![entry(1, "2024-03-01", "09:00:00", "team")]);
        let rendered = render_view(&view, &ViewState::new("2024-03"), &options);
        assert!(rendered.contains('\u{1b}'));
        assert!(rendered.contains("team"));
    }

    #[test]
    fn delete_prompt_names_day_and_time() {
        let pending = PendingDelete {
            id: 2,
            date: "2024-03-01".into(),
            time: "09:00".into(),
            preview: "Standup".into(),
        };
        assert_eq!(
            render_delete_prompt(&pending),
            "Delete the entry from Friday, March 1, 2024 at 9:00 AM?\n    Standup"
        );
    }
}
