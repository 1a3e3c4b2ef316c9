use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, Time};

const DATE_KEY_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[weekday], [month repr:long] [day padding:none], [year]");
const MONTH_TITLE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [year]");
const CLOCK_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

/// Length of a `YYYY-MM-DD` key; longer ISO-8601 strings are truncated to it.
pub const DATE_KEY_LEN: usize = 10;
const MONTH_KEY_LEN: usize = 7;

/// Truncates an ISO-8601 date or timestamp to its `YYYY-MM-DD` prefix.
pub fn date_key(raw: &str) -> &str {
    raw.get(..DATE_KEY_LEN).unwrap_or(raw)
}

/// `HH:MM` prefix of a stored `HH:MM:SS` time.
pub fn time_label(raw: &str) -> &str {
    raw.get(..5).unwrap_or(raw)
}

/// "Friday, March 1, 2024" for `2024-03-01`; unparsable input is returned as-is.
pub fn format_date(date_key_str: &str) -> String {
    parse_date_key(date_key(date_key_str))
        .and_then(|date| date.format(HUMAN_DATE_FORMAT).ok())
        .unwrap_or_else(|| date_key_str.to_string())
}

/// "March 2024" for `2024-03`.
pub fn format_month(month: &str) -> String {
    parse_date_key(&format!("{month}-01"))
        .and_then(|date| date.format(MONTH_TITLE_FORMAT).ok())
        .unwrap_or_else(|| month.to_string())
}

/// 12-hour clock label ("2:05 PM") for a stored time.
pub fn format_time_12h(raw: &str) -> String {
    match parse_clock(time_label(raw)) {
        Some(time) => {
            let (hour, meridiem) = match time.hour() {
                0 => (12, "AM"),
                h @ 1..=11 => (h, "AM"),
                12 => (12, "PM"),
                h => (h - 12, "PM"),
            };
            format!("{hour}:{:02} {meridiem}", time.minute())
        }
        None => time_label(raw).to_string(),
    }
}

/// Rounds up to the next quarter hour. Seconds are ignored, and 23:50 wraps to 00:00.
pub fn round_up_to_quarter(now: Time) -> Time {
    let minute = u32::from(now.minute());
    let rounded = minute.div_ceil(15) * 15;
    let total = i64::from(now.hour()) * 60 + i64::from(rounded);
    Time::MIDNIGHT + Duration::minutes(total)
}

pub fn format_clock(time: Time) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Default time for a new entry.
pub fn rounded_time_now() -> String {
    format_clock(round_up_to_quarter(now().time()))
}

pub fn today_key() -> String {
    format_date_key(now().date())
}

pub fn current_month_key() -> String {
    month_of(&today_key()).to_string()
}

pub fn format_date_key(date: Date) -> String {
    date.format(DATE_KEY_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_date_key(raw: &str) -> Option<Date> {
    Date::parse(raw, DATE_KEY_FORMAT).ok()
}

/// Accepts `HH:MM` (what the time input produces).
pub fn parse_clock(raw: &str) -> Option<Time> {
    Time::parse(raw, CLOCK_FORMAT).ok()
}

pub fn is_valid_month(raw: &str) -> bool {
    raw.len() == MONTH_KEY_LEN && parse_date_key(&format!("{raw}-01")).is_some()
}

/// `YYYY-MM` for a date key.
pub fn month_of(date: &str) -> &str {
    date_key(date).get(..MONTH_KEY_LEN).unwrap_or(date)
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    #[test]
    fn date_key_strips_time_and_zone() {
        assert_eq!(date_key("2024-03-01T00:00:00.000Z"), "2024-03-01");
        assert_eq!(date_key("2024-03-01"), "2024-03-01");
        assert_eq!(date_key("2024"), "2024");
    }

    #[test]
    fn formats_human_date() {
        assert_eq!(format_date("2024-03-01"), "Friday, March 1, 2024");
        assert_eq!(format_date("2024-12-25T00:00:00Z"), "Wednesday, December 25, 2024");
        assert_eq!(format_date("someday"), "someday");
    }

    #[test]
    fn rounds_up_to_next_quarter() {
        assert_eq!(format_clock(round_up_to_quarter(time!(9:00))), "09:00");
        assert_eq!(format_clock(round_up_to_quarter(time!(9:01))), "09:15");
        assert_eq!(format_clock(round_up_to_quarter(time!(9:15:59))), "09:15");
        assert_eq!(format_clock(round_up_to_quarter(time!(9:46))), "10:00");
        assert_eq!(format_clock(round_up_to_quarter(time!(23:59))), "00:00");
    }

    #[test]
    fn twelve_hour_labels() {
        assert_eq!(format_time_12h("00:05:00"), "12:05 AM");
        assert_eq!(format_time_12h("09:30:00"), "9:30 AM");
        assert_eq!(format_time_12h("12:00"), "12:00 PM");
        assert_eq!(format_time_12h("14:05:00"), "2:05 PM");
        assert_eq!(format_time_12h("late"), "late");
    }

    #[test]
    fn month_title() {
        assert_eq!(format_month("2024-03"), "March 2024");
        assert_eq!(format_month("bogus"), "bogus");
    }

    #[test]
    fn month_validation() {
        assert!(is_valid_month("2024-03"));
        assert!(!is_valid_month("2024-13"));
        assert!(!is_valid_month("2024-3"));
        assert!(!is_valid_month("March"));
        assert_eq!(month_of("2024-03-01T00:00:00Z"), "2024-03");
    }
}
