use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::models::{Reading, Unit};

lazy_static! {
    static ref VALUE_EXPRESSION: Regex = Regex::new(r"^\((.+)\)$").unwrap();
    static ref VERSION_EXPRESSION: Regex = Regex::new(r"^\((\d+)\)$").unwrap();
    static ref KWH_EXPRESSION: Regex = Regex::new(r"\((\d+(?:\.\d+)?)\*kWh\)").unwrap();
    static ref KW_EXPRESSION: Regex = Regex::new(r"\((\d+(?:\.\d+)?)\*kW\)").unwrap();
    static ref CUBIC_METER_EXPRESSION: Regex =
        Regex::new(r"\((\d{12}[SW])\)\((\d+\.\d+)\*m3\)").unwrap();
    static ref TIMESTAMP_EXPRESSION: Regex = Regex::new(r"^(\d{12})([SW])$").unwrap();
    static ref OFFSET_EXPRESSION: Regex = Regex::new(r"^([+-])(\d{2}):?(\d{2})$").unwrap();
}

/// Timezone a DSMR timestamp is resolved against.
///
/// The meter reports local time plus a flag telling whether daylight saving
/// time (`S`) or standard time (`W`) is active, so the standard offset is all
/// that is needed to get an unambiguous instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct P1Timezone {
    standard_offset_seconds: i32,
}

impl P1Timezone {
    pub fn from_standard_offset(offset: FixedOffset) -> Self {
        Self { standard_offset_seconds: offset.local_minus_utc() }
    }

    /// Accepts `UTC`, `Z`, `+01:00`, `+0100` and `-05:30` style offsets
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("utc") || text == "Z" {
            return Some(Self { standard_offset_seconds: 0 });
        }

        let caps = OFFSET_EXPRESSION.captures(text)?;
        let hours: i32 = caps[2].parse().ok()?;
        let minutes: i32 = caps[3].parse().ok()?;
        if hours > 23 || minutes > 59 {
            return None;
        }
        let seconds = hours * 3600 + minutes * 60;
        let seconds = if &caps[1] == "-" { -seconds } else { seconds };
        FixedOffset::east_opt(seconds).map(Self::from_standard_offset)
    }

    pub fn offset(&self, daylight_saving: bool) -> Option<FixedOffset> {
        let dst = if daylight_saving { 3600 } else { 0 };
        FixedOffset::east_opt(self.standard_offset_seconds + dst)
    }

    pub fn resolve(&self, local: NaiveDateTime, daylight_saving: bool) -> Option<DateTime<Utc>> {
        let offset = self.offset(daylight_saving)?;
        offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for P1Timezone {
    /// Central European time, where DSMR meters live
    fn default() -> Self {
        Self { standard_offset_seconds: 3600 }
    }
}

impl fmt::Display for P1Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.standard_offset_seconds < 0 { '-' } else { '+' };
        let abs = self.standard_offset_seconds.abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

/// A parsed value, optionally with the capture time the meter attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedValue {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: Reading,
}

impl TimestampedValue {
    fn now(value: Reading) -> Self {
        Self { timestamp: None, value }
    }
}

/// Converts the raw value text of a telegram line into a typed reading.
///
/// Parsers never fail hard: a text that does not have the expected shape
/// simply yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueParser {
    Kwh,
    Watt,
    TimestampedCubicMeter(P1Timezone),
    DsmrVersion,
    MeterIdentifier,
}

impl ValueParser {
    pub fn parse(&self, raw: &str) -> Option<TimestampedValue> {
        let parsed = match self {
            ValueParser::Kwh => parse_kwh(raw).map(|v| TimestampedValue::now(Reading::KilowattHours(v))),
            ValueParser::Watt => parse_watt(raw).map(|v| TimestampedValue::now(Reading::Watts(v))),
            ValueParser::TimestampedCubicMeter(tz) => {
                parse_timestamped_cubic_meter(raw, tz).map(|(timestamp, v)| TimestampedValue {
                    timestamp: Some(timestamp),
                    value: Reading::CubicMeters(v),
                })
            }
            ValueParser::DsmrVersion => parse_dsmr_version(raw).map(|v| TimestampedValue::now(Reading::Text(v))),
            ValueParser::MeterIdentifier => {
                parse_meter_identifier(raw).map(|v| TimestampedValue::now(Reading::Text(v)))
            }
        };

        if parsed.is_none() {
            debug!("{:?} could not parse '{}'", self, raw);
        }
        parsed
    }

    /// Unit of the readings this parser produces, `None` for text values
    pub fn unit(&self) -> Option<Unit> {
        match self {
            ValueParser::Kwh => Some(Unit::KilowattHour),
            ValueParser::Watt => Some(Unit::Watt),
            ValueParser::TimestampedCubicMeter(_) => Some(Unit::CubicMeter),
            ValueParser::DsmrVersion | ValueParser::MeterIdentifier => None,
        }
    }
}

/// `(000123.456*kWh)` -> 123.456
pub fn parse_kwh(raw: &str) -> Option<f64> {
    let caps = KWH_EXPRESSION.captures(raw)?;
    caps[1].parse::<f64>().ok()
}

/// `(00.350*kW)` -> 350 W
pub fn parse_watt(raw: &str) -> Option<f64> {
    let caps = KW_EXPRESSION.captures(raw)?;
    // Shift the decimal point in the text so the result is exact
    format!("{}e3", &caps[1]).parse::<f64>().ok()
}

/// `(210101120000S)(00123.456*m3)` -> capture time and 123.456 m3
pub fn parse_timestamped_cubic_meter(raw: &str, timezone: &P1Timezone) -> Option<(DateTime<Utc>, f64)> {
    let caps = CUBIC_METER_EXPRESSION.captures(raw)?;
    let timestamp = parse_p1_timestamp(&caps[1], timezone)?;
    let value = caps[2].parse::<f64>().ok()?;
    Some((timestamp, value))
}

/// `(42)` -> `42`
pub fn parse_dsmr_version(raw: &str) -> Option<String> {
    let caps = VERSION_EXPRESSION.captures(raw.trim())?;
    Some(caps[1].to_string())
}

pub fn parse_meter_identifier(raw: &str) -> Option<String> {
    parenthesized_value(raw).map(str::to_string)
}

/// The content of a single `(...)` group
pub fn parenthesized_value(raw: &str) -> Option<&str> {
    VALUE_EXPRESSION
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `YYMMDDhhmmssX` where X is `S` (summer/DST) or `W` (winter/standard time)
pub fn parse_p1_timestamp(text: &str, timezone: &P1Timezone) -> Option<DateTime<Utc>> {
    let caps = TIMESTAMP_EXPRESSION.captures(text.trim())?;
    let local = NaiveDateTime::parse_from_str(&caps[1], "%y%m%d%H%M%S").ok()?;
    timezone.resolve(local, &caps[2] == "S")
}

/// Timestamp line value, either bare or wrapped in parentheses
pub fn parse_timestamp_value(raw: &str, timezone: &P1Timezone) -> Option<DateTime<Utc>> {
    let text = parenthesized_value(raw).unwrap_or(raw);
    parse_p1_timestamp(text, timezone)
}
