use chrono::prelude::*;
use chrono_tz::Tz;

pub fn is_valid_date(datestr: &str) -> anyhow::Result<(i32, u32, u32)> {
    let datestr = String::from(datestr);
    let dates = datestr.split('-').collect::<Vec<_>>();
    if dates.len() != 3 {
        return Err(anyhow::Error::msg(datestr));
    }
    let year = dates[0].parse();
    let month = dates[1].parse();
    let day = dates[2].parse();

    if year.is_err() || month.is_err() || day.is_err() {
        return Err(anyhow::Error::msg(datestr));
    }

    let year = year.unwrap();
    let month = month.unwrap();
    let day = day.unwrap();
    if !(1970..=2100).contains(&year) || month < 1 || month > 12 {
        return Err(anyhow::Error::msg(datestr));
    }

    let month_length = get_month_length(year, month);

    if day < 1 || day > month_length {
        return Err(anyhow::Error::msg(datestr));
    }

    Ok((year, month, day))
}

pub fn is_leap_year(year: i32) -> bool {
    year % 400 == 0 || (year % 100 != 0 && year % 4 == 0)
}

// month: January -> 1
pub fn get_month_length(year: i32, month: u32) -> u32 {
    match month - 1 {
        0 => 31,
        1 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        2 => 31,
        3 => 30,
        4 => 31,
        5 => 30,
        6 => 31,
        7 => 31,
        8 => 30,
        9 => 31,
        10 => 30,
        11 => 31,
        _ => panic!("Invalid month"),
    }
}

/// Local wall clock time represented by `ts` in the given timezone.
pub fn local_datetime(ts: i64, tz: &Tz) -> NaiveDateTime {
    tz.timestamp_millis(ts).naive_local()
}

/// Converts a local wall clock time back to a UTC millisecond timestamp.
/// An ambiguous local time (DST fold) resolves to the earlier instant and
/// a nonexistent local time (DST gap) to `None`.
pub fn local_to_millis(tz: &Tz, local: &NaiveDateTime) -> Option<i64> {
    match tz.from_local_datetime(local) {
        chrono::LocalResult::Single(dt) => Some(dt.timestamp_millis()),
        chrono::LocalResult::Ambiguous(first, _) => Some(first.timestamp_millis()),
        chrono::LocalResult::None => None,
    }
}

pub fn same_calendar_day(ts1: i64, ts2: i64, tz: &Tz) -> bool {
    local_datetime(ts1, tz).date() == local_datetime(ts2, tz).date()
}

pub fn local_hour(ts: i64, tz: &Tz) -> u32 {
    tz.timestamp_millis(ts).hour()
}

/// Adds `months` calendar months to a local datetime, clamping the
/// day-of-month to the length of the target month (Jan 31 + 1 month
/// is Feb 28/29, never Mar 2/3).
pub fn add_months(local: &NaiveDateTime, months: i64) -> NaiveDateTime {
    let total = local.year() as i64 * 12 + (local.month() as i64 - 1) + months;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = std::cmp::min(local.day(), get_month_length(year, month));
    NaiveDate::from_ymd(year, month, day).and_time(local.time())
}

pub fn add_years(local: &NaiveDateTime, years: i64) -> NaiveDateTime {
    add_months(local, years * 12)
}

/// Parses "HH:MM" into minutes after midnight.
pub fn parse_clock_time(clock: &str) -> anyhow::Result<u32> {
    let parts = clock.split(':').collect::<Vec<_>>();
    if parts.len() != 2 {
        return Err(anyhow::Error::msg(clock.to_string()));
    }
    let hours: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::Error::msg(clock.to_string()))?;
    let minutes: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::Error::msg(clock.to_string()))?;
    if hours > 23 || minutes > 59 {
        return Err(anyhow::Error::msg(clock.to_string()));
    }
    Ok(hours * 60 + minutes)
}

/// Formats a UTC millisecond timestamp in the compact `YYYYMMDDTHHMMSSZ`
/// form used by recurrence rule UNTIL values.
pub fn format_compact_utc(ts: i64) -> String {
    Utc.timestamp_millis(ts).format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parses the compact `YYYYMMDDTHHMMSSZ` form back to a UTC millisecond
/// timestamp. A date-only `YYYYMMDD` value is accepted as midnight UTC.
pub fn parse_compact_utc(value: &str) -> anyhow::Result<i64> {
    let err = || anyhow::Error::msg(value.to_string());
    // Byte-indexed slicing below requires single-byte characters
    if value.len() < 8 || !value.is_ascii() {
        return Err(err());
    }
    let year: i32 = value[0..4].parse().map_err(|_| err())?;
    let month: u32 = value[4..6].parse().map_err(|_| err())?;
    let day: u32 = value[6..8].parse().map_err(|_| err())?;
    if !(1970..=2100).contains(&year) || month < 1 || month > 12 {
        return Err(err());
    }
    if day < 1 || day > get_month_length(year, month) {
        return Err(err());
    }

    let (hour, minute, second) = if value.len() >= 15 {
        (
            value[9..11].parse().map_err(|_| err())?,
            value[11..13].parse().map_err(|_| err())?,
            value[13..15].parse().map_err(|_| err())?,
        )
    } else {
        (0, 0, 0)
    };
    if hour > 23 || minute > 59 || second > 59 {
        return Err(err());
    }

    Ok(Utc
        .ymd(year, month, day)
        .and_hms(hour, minute, second)
        .timestamp_millis())
}
