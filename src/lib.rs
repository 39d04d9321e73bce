//! P1 smart meter library
//!
//! Reassembles the byte stream of a DSMR smart meter's P1 port into checksum
//! verified telegrams, detects which meters the telegram describes and turns
//! every following telegram into typed measurements.

pub mod config;
pub mod events;
pub mod metering_p1;
pub mod models;
pub mod obis_utils;

// Re-export common types for easier access
pub use config::{Config, ConfigError};
pub use events::{ChannelListener, MeasurementListener, MeteringData, P1Event};
pub use metering_p1::parser_factory::ParserFactory;
pub use metering_p1::telegram_parser::{DialectInfo, TelegramParser};
pub use metering_p1::{P1Manager, ParserSlot, TelegramHandler};
pub use models::{Measurement, MeasurementSummary, Meter, MeterMapping, Reading};

pub fn get_unix_ts() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
