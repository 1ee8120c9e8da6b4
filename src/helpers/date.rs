use time::macros::format_description;
use time::{Date, Month};

/// Parse a user- or backend-supplied date.
///
/// `.` and `/` are treated as `-`. A `DD-MM-YYYY` shape (two-digit first part,
/// four-digit last part) is read day first; anything else is read as
/// `YYYY-MM-DD`, optionally followed by a `T…` time part which is ignored.
pub fn parse_date(input: &str) -> Option<Date> {
    let normalized = input.trim().replace(['.', '/'], "-");
    if normalized.is_empty() {
        return None;
    }
    let parts: Vec<&str> = normalized.split('-').collect();
    if parts.len() == 3 && parts[0].len() == 2 && parts[2].len() == 4 {
        return build_date(parts[2], parts[1], parts[0]);
    }
    let date_part = normalized.split(['T', ' ']).next().unwrap_or_default();
    let parts: Vec<&str> = date_part.split('-').collect();
    if parts.len() != 3 || parts[0].len() != 4 {
        return None;
    }
    build_date(parts[0], parts[1], parts[2])
}

fn build_date(year: &str, month: &str, day: &str) -> Option<Date> {
    let all_digits = |s: &str| !s.is_empty() && s.len() <= 4 && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(year) || !all_digits(month) || !all_digits(day) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let day: u8 = day.parse().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Format a check date the way `/checks` expects it: `DD-MM-YYYY`.
pub fn format_check_date(input: &str) -> Option<String> {
    let date = parse_date(input)?;
    date.format(format_description!("[day]-[month]-[year]")).ok()
}

/// Long human form of a result day, e.g. `6 January 2025`. Unparseable input is returned as-is.
pub fn display_day(input: &str) -> String {
    parse_date(input)
        .and_then(|d| {
            d.format(format_description!(
                "[day padding:none] [month repr:long] [year]"
            ))
            .ok()
        })
        .unwrap_or_else(|| input.to_string())
}
