use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;

use crate::metering_p1::telegram_parser::DialectInfo;
use crate::models::{Measurement, MeasurementSummary, Meter, MeterMapping, Reading};
use crate::obis_utils;

/// Receives the results of the telegram pipeline
pub trait MeasurementListener {
    /// Called exactly once, right after the meter mapping was detected
    fn meters_discovered(&mut self, dialect: &DialectInfo, mapping: &MeterMapping);

    /// Called for every parsed telegram
    fn measurements_read(&mut self, measurements: &HashSet<Measurement<'_>>);
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredMeter {
    pub obis_code: String,
    pub description: Option<&'static str>,
    #[serde(flatten)]
    pub meter: Meter,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryData {
    pub dialect: DialectInfo,
    pub meters: Vec<DiscoveredMeter>,
}

impl DiscoveryData {
    pub fn new(dialect: &DialectInfo, mapping: &MeterMapping) -> Self {
        let meters = mapping
            .sorted()
            .into_iter()
            .map(|(code, meter)| DiscoveredMeter {
                obis_code: code.to_string(),
                description: obis_utils::get_obis_description(code),
                meter: meter.clone(),
            })
            .collect();
        Self { dialect: dialect.clone(), meters }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadingData {
    pub meter: Meter,
    pub timestamp: DateTime<Utc>,
    pub value: Reading,
}

/// Owned snapshot of one telegram's measurements
#[derive(Debug, Clone, Serialize)]
pub struct MeteringData {
    pub meter_name: String,
    pub transmission_time: u64,
    pub readings: Vec<ReadingData>,
    pub summary: MeasurementSummary,
}

impl MeteringData {
    pub fn new(meter_name: &str, measurements: &HashSet<Measurement<'_>>) -> Self {
        let readings = Measurement::sort(measurements)
            .into_iter()
            .map(|m| ReadingData {
                meter: m.meter.clone(),
                timestamp: m.timestamp,
                value: m.value,
            })
            .collect();

        Self {
            meter_name: meter_name.to_string(),
            transmission_time: crate::get_unix_ts(),
            readings,
            summary: MeasurementSummary::from_measurements(measurements),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum P1Event {
    MetersDiscovered(DiscoveryData),
    Measurements(MeteringData),
}

/// Forwards everything as owned events over a channel
pub struct ChannelListener {
    sender: UnboundedSender<P1Event>,
    meter_name: String,
}

impl ChannelListener {
    pub fn new(sender: UnboundedSender<P1Event>) -> Self {
        Self { sender, meter_name: String::new() }
    }

    fn send(&self, event: P1Event) {
        if self.sender.send(event).is_err() {
            error!("Event receiver is gone, dropping event");
        }
    }
}

impl MeasurementListener for ChannelListener {
    fn meters_discovered(&mut self, dialect: &DialectInfo, mapping: &MeterMapping) {
        self.meter_name = dialect.meter_identifier.clone();
        debug!("Announcing {} meters of {}", mapping.len(), self.meter_name);
        self.send(P1Event::MetersDiscovered(DiscoveryData::new(dialect, mapping)));
    }

    fn measurements_read(&mut self, measurements: &HashSet<Measurement<'_>>) {
        self.send(P1Event::Measurements(MeteringData::new(&self.meter_name, measurements)));
    }
}
