//! English date, time and duration wording used in client documents.

use chrono::{Datelike, NaiveDate};
use magalia_core::domain::view::DayView;

const WEEKDAYS: [&str; 7] =
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub fn ordinal(n: u32) -> String {
    if (11..=13).contains(&(n % 100)) {
        return format!("{n}th");
    }
    let suffix = match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// `Monday, January 1st 2024`.
pub fn long_date(date: NaiveDate) -> String {
    let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS[date.month0() as usize];
    format!("{weekday}, {month} {} {}", ordinal(date.day()), date.year())
}

fn destination(day: &DayView) -> &str {
    day.destination.as_deref().map(str::trim).unwrap_or("")
}

/// Consecutive days starting at `index` that share its destination. Days
/// without a destination never start a run.
pub fn nights_from(days: &[DayView], index: usize) -> usize {
    let Some(current) = days.get(index).map(destination) else {
        return 0;
    };
    if current.is_empty() {
        return 0;
    }
    days[index..].iter().take_while(|day| destination(day) == current).count()
}

pub fn starts_destination_run(days: &[DayView], index: usize) -> bool {
    match index {
        0 => !days.is_empty(),
        _ => match (days.get(index - 1), days.get(index)) {
            (Some(previous), Some(current)) => destination(previous) != destination(current),
            _ => false,
        },
    }
}

/// Heading line of a day block: `Monday, January 1st 2024 : Paris for 2 nights`.
///
/// Only the first day of a destination run names the destination. A day
/// without a date drops the date part; `None` means there is nothing to print.
pub fn day_heading(days: &[DayView], index: usize) -> Option<String> {
    let day = days.get(index)?;
    let date = day.date.map(long_date);

    let stay = if starts_destination_run(days, index) {
        let nights = nights_from(days, index);
        (nights > 0).then(|| {
            let plural = if nights > 1 { "s" } else { "" };
            format!("{} for {nights} night{plural}", destination(day))
        })
    } else {
        None
    };

    match (date, stay) {
        (Some(date), Some(stay)) => Some(format!("{date} : {stay}")),
        (Some(date), None) => Some(format!("{date} :")),
        (None, Some(stay)) => Some(stay),
        (None, None) => None,
    }
}

fn clock_parts(raw: &str) -> Option<(u32, u32)> {
    let lowered = raw.trim().to_ascii_lowercase();
    let (cleaned, meridiem) = match lowered.strip_suffix("pm") {
        Some(rest) => (rest, Some(true)),
        None => match lowered.strip_suffix("am") {
            Some(rest) => (rest, Some(false)),
            None => (lowered.as_str(), None),
        },
    };
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let mut parts = cleaned.splitn(2, ':');
    let mut hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: String =
        parts.next().unwrap_or("0").chars().filter(char::is_ascii_digit).collect();
    let minutes: u32 = if minutes.is_empty() { 0 } else { minutes.parse().ok()? };
    match meridiem {
        Some(true) if hours < 12 => hours += 12,
        Some(false) if hours == 12 => hours = 0,
        _ => {}
    }
    Some((hours, minutes))
}

/// `15:05` becomes `3:05 pm`. Unreadable input yields an empty string.
pub fn format_time(raw: &str) -> String {
    let Some((hours, minutes)) = clock_parts(raw) else {
        return String::new();
    };
    let suffix = if hours >= 12 { "pm" } else { "am" };
    let hours = match hours % 12 {
        0 => 12,
        other => other,
    };
    format!("{hours}:{minutes:02} {suffix}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Span {
    Minutes(u32),
    EndBeforeStart,
}

/// Elapsed time between two 24h clock strings.
pub fn span_between(start: &str, end: &str) -> Option<Span> {
    let (start_h, start_m) = clock_parts(start)?;
    let (end_h, end_m) = clock_parts(end)?;
    let start = start_h * 60 + start_m;
    let end = end_h * 60 + end_m;
    if end >= start {
        Some(Span::Minutes(end - start))
    } else {
        Some(Span::EndBeforeStart)
    }
}

/// `210` minutes becomes `3h 30m`.
pub fn human_duration(minutes: u32) -> String {
    let (hours, rest) = (minutes / 60, minutes % 60);
    match (hours, rest) {
        (0, rest) => format!("{rest}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, rest) => format!("{hours}h {rest}m"),
    }
}

/// Reads the free-form duration field: `3h30`, `3:30`, `3h`, `90m`, `90min`
/// or bare minutes. Anything else is echoed back trimmed.
pub fn pretty_duration(raw: &str) -> String {
    let text = raw.trim();
    let lowered = text.to_ascii_lowercase();

    if let Ok(minutes) = lowered.parse::<u32>() {
        return human_duration(minutes);
    }
    if let Some(hours) = lowered.strip_suffix('h').and_then(|h| h.trim().parse::<u32>().ok()) {
        return human_duration(hours * 60);
    }
    let minutes_only = lowered.strip_suffix("min").or_else(|| lowered.strip_suffix('m'));
    if let Some(minutes) = minutes_only.and_then(|m| m.trim().parse::<u32>().ok()) {
        return human_duration(minutes);
    }
    for separator in ['h', ':', ' '] {
        if let Some((hours, minutes)) = lowered.split_once(separator) {
            let hours = hours.trim().parse::<u32>();
            let minutes = minutes.trim();
            if let (Ok(hours), true) = (hours, (1..=2).contains(&minutes.len())) {
                if let Ok(minutes) = minutes.parse::<u32>() {
                    return human_duration(hours * 60 + minutes);
                }
            }
        }
    }
    text.to_string()
}
