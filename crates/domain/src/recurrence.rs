use crate::date::{format_compact_utc, parse_compact_utc};
use chrono::prelude::*;
use itertools::Itertools;
use serde::{de::Visitor, Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum InvalidFrequencyError {
    #[error("Invalid frequency specified: {0}")]
    Unknown(String),
}

impl FromStr for Frequency {
    type Err = InvalidFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            _ => Err(InvalidFrequencyError::Unknown(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeekdayCode {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl WeekdayCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sun => "SU",
            Self::Mon => "MO",
            Self::Tue => "TU",
            Self::Wed => "WE",
            Self::Thu => "TH",
            Self::Fri => "FR",
            Self::Sat => "SA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sun => "Sunday",
            Self::Mon => "Monday",
            Self::Tue => "Tuesday",
            Self::Wed => "Wednesday",
            Self::Thu => "Thursday",
            Self::Fri => "Friday",
            Self::Sat => "Saturday",
        }
    }

    /// 0 = Sunday .. 6 = Saturday
    pub fn from_num(num: u32) -> Option<Self> {
        match num {
            0 => Some(Self::Sun),
            1 => Some(Self::Mon),
            2 => Some(Self::Tue),
            3 => Some(Self::Wed),
            4 => Some(Self::Thu),
            5 => Some(Self::Fri),
            6 => Some(Self::Sat),
            _ => None,
        }
    }

    pub fn from_chrono(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => Self::Sun,
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
        }
    }
}

impl Display for WeekdayCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Error, Debug)]
pub enum InvalidWeekDayError {
    #[error("Invalid weekday specified: {0}")]
    InvalidWeekdayIdentifier(String),
}

impl FromStr for WeekdayCode {
    type Err = InvalidWeekDayError;

    fn from_str(day: &str) -> Result<Self, Self::Err> {
        match day.to_uppercase().as_str() {
            "SU" => Ok(Self::Sun),
            "MO" => Ok(Self::Mon),
            "TU" => Ok(Self::Tue),
            "WE" => Ok(Self::Wed),
            "TH" => Ok(Self::Thu),
            "FR" => Ok(Self::Fri),
            "SA" => Ok(Self::Sat),
            _ => Err(InvalidWeekDayError::InvalidWeekdayIdentifier(
                day.to_string(),
            )),
        }
    }
}

impl Serialize for WeekdayCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for WeekdayCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct WeekdayCodeVisitor;

        impl<'de> Visitor<'de> for WeekdayCodeVisitor {
            type Value = WeekdayCode;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("A valid string representation of weekday")
            }

            fn visit_str<E>(self, value: &str) -> Result<WeekdayCode, E>
            where
                E: serde::de::Error,
            {
                value
                    .parse::<WeekdayCode>()
                    .map_err(|_| E::custom(format!("Malformed weekday: {}", value)))
            }
        }

        deserializer.deserialize_str(WeekdayCodeVisitor)
    }
}

#[derive(Error, Debug)]
pub enum RecurrenceError {
    #[error("Frequency is required for a recurrence rule")]
    MissingFrequency,
}

/// Upper bound on the INTERVAL value a rule will carry.
const MAX_INTERVAL: i64 = 10_000;

/// Builder for recurrence rules in the canonical `RRULE:...` textual form.
///
/// Setters are order-insensitive and validate their domain, silently
/// dropping invalid values; the one piece of coupled state is the
/// count/until pair, where setting one clears the other.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    freq: Option<Frequency>,
    interval: i64,
    count: Option<u32>,
    /// UTC millisecond timestamp, exclusive with `count`
    until: Option<i64>,
    by_day: Vec<WeekdayCode>,
    by_month_day: Vec<u32>,
    by_month: Vec<u32>,
    by_set_pos: Vec<i32>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            freq: None,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            by_set_pos: Vec::new(),
        }
    }
}

impl RecurrenceRule {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) -> &mut Self {
        *self = Default::default();
        self
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.freq
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn until(&self) -> Option<i64> {
        self.until
    }

    pub fn by_day(&self) -> &[WeekdayCode] {
        &self.by_day
    }

    pub fn by_month_day(&self) -> &[u32] {
        &self.by_month_day
    }

    pub fn by_month(&self) -> &[u32] {
        &self.by_month
    }

    pub fn by_set_pos(&self) -> &[i32] {
        &self.by_set_pos
    }

    /// Case-insensitive DAILY/WEEKLY/MONTHLY/YEARLY. Anything else
    /// falls back to WEEKLY.
    pub fn set_frequency(&mut self, freq: &str) -> &mut Self {
        self.freq = Some(freq.parse().unwrap_or(Frequency::Weekly));
        self
    }

    /// Coerced to at least 1. Absurdly large values are clamped so
    /// that expansion step arithmetic cannot overflow.
    pub fn set_interval(&mut self, interval: i64) -> &mut Self {
        self.interval = interval.max(1).min(MAX_INTERVAL);
        self
    }

    /// A valid count clears any until value.
    pub fn set_count(&mut self, count: i64) -> &mut Self {
        if count > 0 {
            self.count = Some(count as u32);
            self.until = None;
        } else {
            self.count = None;
        }
        self
    }

    /// A valid until clears any count value. Unparseable input clears
    /// the until field without error.
    pub fn set_until(&mut self, until: &str) -> &mut Self {
        match parse_until(until) {
            Some(ts) => {
                self.until = Some(ts);
                self.count = None;
            }
            None => self.until = None,
        }
        self
    }

    pub fn set_until_ts(&mut self, until: i64) -> &mut Self {
        self.until = Some(until);
        self.count = None;
        self
    }

    /// Adds weekday codes (SU, MO, ..), deduplicated; invalid codes are
    /// silently dropped.
    pub fn add_by_day(&mut self, days: &[&str]) -> &mut Self {
        for day in days {
            if let Ok(weekday) = day.parse::<WeekdayCode>() {
                if !self.by_day.contains(&weekday) {
                    self.by_day.push(weekday);
                }
            }
        }
        self
    }

    /// Adds weekdays by number, 0 = Sunday .. 6 = Saturday.
    pub fn add_by_day_num(&mut self, day_nums: &[u32]) -> &mut Self {
        for num in day_nums {
            if let Some(weekday) = WeekdayCode::from_num(*num) {
                if !self.by_day.contains(&weekday) {
                    self.by_day.push(weekday);
                }
            }
        }
        self
    }

    pub fn add_weekday(&mut self, weekday: WeekdayCode) -> &mut Self {
        if !self.by_day.contains(&weekday) {
            self.by_day.push(weekday);
        }
        self
    }

    pub fn add_by_month_day(&mut self, days: &[i64]) -> &mut Self {
        for day in days {
            if (1..=31).contains(day) && !self.by_month_day.contains(&(*day as u32)) {
                self.by_month_day.push(*day as u32);
            }
        }
        self
    }

    pub fn add_by_month(&mut self, months: &[i64]) -> &mut Self {
        for month in months {
            if (1..=12).contains(month) && !self.by_month.contains(&(*month as u32)) {
                self.by_month.push(*month as u32);
            }
        }
        self
    }

    pub fn add_by_set_pos(&mut self, positions: &[i64]) -> &mut Self {
        for pos in positions {
            let valid = (1..=31).contains(pos) || (-31..=-1).contains(pos);
            if valid && !self.by_set_pos.contains(&(*pos as i32)) {
                self.by_set_pos.push(*pos as i32);
            }
        }
        self
    }

    /// Serializes to the canonical rule string. INTERVAL is omitted when
    /// it is 1 and empty filter lists are omitted entirely.
    pub fn build(&self) -> Result<String, RecurrenceError> {
        let freq = self.freq.ok_or(RecurrenceError::MissingFrequency)?;

        let mut parts = vec![format!("FREQ={}", freq)];

        if self.interval != 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }

        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        } else if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", format_compact_utc(until)));
        }

        if !self.by_day.is_empty() {
            parts.push(format!("BYDAY={}", self.by_day.iter().join(",")));
        }
        if !self.by_month_day.is_empty() {
            parts.push(format!("BYMONTHDAY={}", self.by_month_day.iter().join(",")));
        }
        if !self.by_month.is_empty() {
            parts.push(format!("BYMONTH={}", self.by_month.iter().join(",")));
        }
        if !self.by_set_pos.is_empty() {
            parts.push(format!("BYSETPOS={}", self.by_set_pos.iter().join(",")));
        }

        Ok(format!("RRULE:{}", parts.join(";")))
    }

    /// Tolerant inverse of [`build`](Self::build). A leading `RRULE:`
    /// prefix is optional, unknown keys are ignored and malformed
    /// values leave the corresponding field unset.
    pub fn parse_str(rule: &str) -> Self {
        let mut parsed = Self::new();

        let rule_part = rule.strip_prefix("RRULE:").unwrap_or(rule);

        for part in rule_part.split(';') {
            let mut kv = part.splitn(2, '=');
            let key = kv.next().unwrap_or("");
            let value = match kv.next() {
                Some(v) => v,
                None => continue,
            };

            match key.to_uppercase().as_str() {
                "FREQ" => {
                    parsed.set_frequency(value);
                }
                "INTERVAL" => {
                    if let Ok(interval) = value.parse::<i64>() {
                        parsed.set_interval(interval);
                    }
                }
                "COUNT" => {
                    if let Ok(count) = value.parse::<i64>() {
                        parsed.set_count(count);
                    }
                }
                "UNTIL" => {
                    parsed.set_until(value);
                }
                "BYDAY" => {
                    let days = value.split(',').collect::<Vec<_>>();
                    parsed.add_by_day(&days);
                }
                "BYMONTHDAY" => {
                    let days = parse_int_list(value);
                    parsed.add_by_month_day(&days);
                }
                "BYMONTH" => {
                    let months = parse_int_list(value);
                    parsed.add_by_month(&months);
                }
                "BYSETPOS" => {
                    let positions = parse_int_list(value);
                    parsed.add_by_set_pos(&positions);
                }
                _ => {}
            }
        }

        parsed
    }

    /// Human readable description of the rule, e.g.
    /// "Every 2 weeks on Monday, Wednesday" or "Monthly on the first Tuesday".
    pub fn describe(&self) -> String {
        let freq = match self.freq {
            Some(freq) => freq,
            None => return "No recurrence".to_string(),
        };

        let mut text = match freq {
            Frequency::Daily => {
                if self.interval == 1 {
                    "Daily".to_string()
                } else {
                    format!("Every {} days", self.interval)
                }
            }
            Frequency::Weekly => self.describe_weekly(),
            Frequency::Monthly => self.describe_monthly(),
            Frequency::Yearly => self.describe_yearly(),
        };

        if let Some(count) = self.count {
            text.push_str(&format!(", {} times", count));
        } else if let Some(until) = self.until {
            let date = Utc.timestamp_millis(until).format("%B %-d, %Y");
            text.push_str(&format!(", until {}", date));
        }

        text
    }

    fn describe_weekly(&self) -> String {
        if self.by_day.is_empty() {
            return if self.interval == 1 {
                "Weekly".to_string()
            } else {
                format!("Every {} weeks", self.interval)
            };
        }

        let weekdays = [
            WeekdayCode::Mon,
            WeekdayCode::Tue,
            WeekdayCode::Wed,
            WeekdayCode::Thu,
            WeekdayCode::Fri,
        ];
        if self.by_day.len() == 5 && weekdays.iter().all(|d| self.by_day.contains(d)) {
            return "Every weekday".to_string();
        }
        if self.by_day.len() == 2
            && self.by_day.contains(&WeekdayCode::Sat)
            && self.by_day.contains(&WeekdayCode::Sun)
        {
            return "Every weekend".to_string();
        }

        let days = self.by_day.iter().map(|d| d.name()).join(", ");
        if self.interval == 1 {
            format!("Weekly on {}", days)
        } else {
            format!("Every {} weeks on {}", self.interval, days)
        }
    }

    fn describe_monthly(&self) -> String {
        if !self.by_month_day.is_empty() {
            let days = self.by_month_day.iter().join(", ");
            return if self.interval == 1 {
                format!("Monthly on day {}", days)
            } else {
                format!("Every {} months on day {}", self.interval, days)
            };
        }

        if !self.by_day.is_empty() && !self.by_set_pos.is_empty() {
            let positions = self
                .by_set_pos
                .iter()
                .map(|pos| set_pos_name(*pos))
                .join(", ");
            let days = self.by_day.iter().map(|d| d.name()).join(", ");
            return if self.interval == 1 {
                format!("Monthly on the {} {}", positions, days)
            } else {
                format!("Every {} months on the {} {}", self.interval, positions, days)
            };
        }

        if self.interval == 1 {
            "Monthly".to_string()
        } else {
            format!("Every {} months", self.interval)
        }
    }

    fn describe_yearly(&self) -> String {
        if !self.by_month.is_empty() && !self.by_month_day.is_empty() {
            let months = self
                .by_month
                .iter()
                .map(|month| month_name(*month))
                .join(", ");
            let days = self.by_month_day.iter().join(", ");
            return if self.interval == 1 {
                format!("Yearly on {} {}", months, days)
            } else {
                format!("Every {} years on {} {}", self.interval, months, days)
            };
        }

        if self.interval == 1 {
            "Yearly".to_string()
        } else {
            format!("Every {} years", self.interval)
        }
    }
}

/// Presets for the recurrence shapes the surrounding application offers
/// directly in its UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommonPattern {
    Daily,
    Weekdays,
    Weekends,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

#[derive(Clone, Debug, Default)]
pub struct CommonPatternOptions {
    pub interval: Option<i64>,
    pub day_of_week: Option<WeekdayCode>,
    pub day_of_month: Option<i64>,
    /// Week-of-month position, e.g. 2 for "second Tuesday"
    pub week_of_month: Option<i64>,
    pub month: Option<i64>,
    pub count: Option<i64>,
    pub until: Option<i64>,
}

impl RecurrenceRule {
    pub fn common_pattern(pattern: CommonPattern, options: &CommonPatternOptions) -> Self {
        let mut rule = Self::new();

        match pattern {
            CommonPattern::Daily => {
                rule.set_frequency("DAILY")
                    .set_interval(options.interval.unwrap_or(1));
            }
            CommonPattern::Weekdays => {
                rule.set_frequency("WEEKLY")
                    .add_by_day(&["MO", "TU", "WE", "TH", "FR"]);
            }
            CommonPattern::Weekends => {
                rule.set_frequency("WEEKLY").add_by_day(&["SA", "SU"]);
            }
            CommonPattern::Weekly | CommonPattern::Biweekly => {
                let interval = if pattern == CommonPattern::Biweekly {
                    2
                } else {
                    options.interval.unwrap_or(1)
                };
                rule.set_frequency("WEEKLY").set_interval(interval);
                if let Some(day) = options.day_of_week {
                    rule.add_weekday(day);
                }
            }
            CommonPattern::Monthly => {
                rule.set_frequency("MONTHLY")
                    .set_interval(options.interval.unwrap_or(1));
                if let Some(day) = options.day_of_month {
                    rule.add_by_month_day(&[day]);
                } else if let (Some(week), Some(day)) = (options.week_of_month, options.day_of_week)
                {
                    rule.add_by_set_pos(&[week]);
                    rule.add_weekday(day);
                }
            }
            CommonPattern::Yearly => {
                rule.set_frequency("YEARLY")
                    .set_interval(options.interval.unwrap_or(1));
                if let Some(month) = options.month {
                    rule.add_by_month(&[month]);
                    if let Some(day) = options.day_of_month {
                        rule.add_by_month_day(&[day]);
                    } else if let (Some(week), Some(day)) =
                        (options.week_of_month, options.day_of_week)
                    {
                        rule.add_by_set_pos(&[week]);
                        rule.add_weekday(day);
                    }
                }
            }
        }

        if let Some(count) = options.count {
            rule.set_count(count);
        } else if let Some(until) = options.until {
            rule.set_until_ts(until);
        }

        rule
    }
}

fn parse_int_list(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// Until values can arrive in the compact `YYYYMMDDTHHMMSSZ` form, as
/// RFC 3339, or as a plain `YYYY-MM-DD` date from legacy data.
fn parse_until(value: &str) -> Option<i64> {
    if let Ok(ts) = parse_compact_utc(value) {
        return Some(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok((year, month, day)) = crate::date::is_valid_date(value) {
        return Some(Utc.ymd(year, month, day).and_hms(0, 0, 0).timestamp_millis());
    }
    None
}

fn set_pos_name(pos: i32) -> String {
    match pos {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        4 => "fourth".to_string(),
        5 => "fifth".to_string(),
        -1 => "last".to_string(),
        -2 => "second to last".to_string(),
        -3 => "third to last".to_string(),
        other => other.to_string(),
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "",
    }
}
