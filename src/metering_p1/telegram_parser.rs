use chrono::{DateTime, SubsecRound, Utc};
use log::debug;
use serde::Serialize;
use std::collections::HashSet;

use super::cleaner::{self, TelegramLines};
use super::value_parser::{self, P1Timezone};
use crate::models::{Measurement, MeterMapping};
use crate::obis_utils;

/// What the parser factory learned about the meter from its first telegram
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialectInfo {
    /// `DSMR-<code>`, e.g. `DSMR-42`
    pub version: String,
    pub vendor_information: String,
    pub meter_identifier: String,
    pub timezone: P1Timezone,
}

/// Applies an established meter mapping to every telegram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramParser {
    mapping: MeterMapping,
    dialect: DialectInfo,
}

impl TelegramParser {
    pub fn new(mapping: MeterMapping, dialect: DialectInfo) -> Self {
        Self { mapping, dialect }
    }

    pub fn mapping(&self) -> &MeterMapping {
        &self.mapping
    }

    pub fn dialect(&self) -> &DialectInfo {
        &self.dialect
    }

    pub fn parse(&self, telegram: &str) -> HashSet<Measurement<'_>> {
        self.parse_lines(&cleaner::split_telegram(telegram))
    }

    /// Every mapped line whose value parses becomes one measurement; lines
    /// that fail to parse are dropped on their own.
    pub fn parse_lines(&self, lines: &TelegramLines) -> HashSet<Measurement<'_>> {
        let timestamp = self.telegram_timestamp(lines);
        let mut measurements = HashSet::new();

        for (code, raw) in lines {
            let Some(meter) = self.mapping.get(code) else {
                continue;
            };
            match meter.extract_measurement(timestamp, raw) {
                Some(measurement) => {
                    measurements.insert(measurement);
                }
                None => debug!("Dropping {} with unparsable value {}", code, raw),
            }
        }

        measurements
    }

    /// The telegram's own timestamp, or now (whole seconds) when it is
    /// missing or broken
    pub fn telegram_timestamp(&self, lines: &TelegramLines) -> DateTime<Utc> {
        if let Some(raw) = lines.get(obis_utils::TIMESTAMP) {
            match value_parser::parse_timestamp_value(raw, &self.dialect.timezone) {
                Some(timestamp) => return timestamp,
                None => debug!("Could not parse {} as P1 timestamp", raw),
            }
        }
        Utc::now().trunc_subsecs(0)
    }
}
