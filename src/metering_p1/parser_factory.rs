use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};

use super::cleaner::{self, TelegramLines};
use super::telegram_parser::{DialectInfo, TelegramParser};
use super::value_parser::{self, P1Timezone, ValueParser};
use super::{DetectionError, GasDetectionError};
use crate::config::{ConfigError, ParserConfig};
use crate::models::{Direction, Meter, MeterMapping, Reading};
use crate::obis_utils;

/// Inspects the first usable telegram and derives the OBIS code -> meter
/// mapping for the meter at hand.
#[derive(Debug, Clone, Default)]
pub struct ParserFactory {
    timezone: P1Timezone,
    dsmr_version_override: Option<String>,
}

impl ParserFactory {
    pub fn new(timezone: P1Timezone, dsmr_version_override: Option<String>) -> Self {
        Self { timezone, dsmr_version_override }
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.timezone()?, config.dsmr_version_override.clone()))
    }

    pub fn create(&self, telegram: &str) -> Result<TelegramParser, DetectionError> {
        let vendor_information = cleaner::vendor_information(telegram).unwrap_or_default();
        self.create_from_lines(&cleaner::split_telegram(telegram), &vendor_information)
    }

    pub fn create_from_lines(&self, lines: &TelegramLines, vendor_information: &str) -> Result<TelegramParser, DetectionError> {
        let detected_version = extract_text(lines, obis_utils::DSMR_VERSION, ValueParser::DsmrVersion);
        let meter_id = extract_text(lines, obis_utils::SMART_METER_ID, ValueParser::MeterIdentifier)
            .ok_or_else(|| {
                error!("No meter identifier present.");
                DetectionError::MissingMeterIdentifier
            })?;

        let version = match &self.dsmr_version_override {
            Some(version) => {
                info!("Smart Meter version override present, using {}", version);
                version.clone()
            }
            None => detected_version.ok_or_else(|| {
                error!("No DSMR version present");
                DetectionError::MissingVersion
            })?,
        };

        let mut meters = HashMap::new();
        self.add_fixed_meters(lines, &meter_id, &mut meters);

        for (bus, bus_lines) in group_by_bus(lines) {
            info!("Extracting for bus {}", bus);
            match self.detect_gas_meter(bus, &bus_lines) {
                Ok((code, meter)) => {
                    info!("Found gas meter {} on {}", meter.identifier(), code);
                    meters.insert(code.to_string(), meter);
                }
                Err(e) => warn!("No meter registered for bus {}: {}", bus, e),
            }
        }

        for (code, meter) in &meters {
            debug!("{} -> {} [{}]", code, meter, obis_utils::get_obis_description(code).unwrap_or("unknown"));
        }

        Ok(TelegramParser::new(
            MeterMapping::new(meters),
            DialectInfo {
                version: format!("DSMR-{}", version),
                vendor_information: vendor_information.to_string(),
                meter_identifier: meter_id,
                timezone: self.timezone,
            },
        ))
    }

    fn add_fixed_meters(&self, lines: &TelegramLines, meter_id: &str, meters: &mut HashMap<String, Meter>) {
        let fixed = [
            (obis_utils::ELECTRICITY_CURRENT_POWER_CONSUMPTION, Meter::power(Direction::ToClient, meter_id)),
            (obis_utils::ELECTRICITY_CURRENT_POWER_PRODUCTION, Meter::power(Direction::FromClient, meter_id)),
            (obis_utils::ELECTRICITY_CONSUMPTION_RATE_1, Meter::energy(Direction::ToClient, 1, meter_id)),
            (obis_utils::ELECTRICITY_CONSUMPTION_RATE_2, Meter::energy(Direction::ToClient, 2, meter_id)),
            (obis_utils::ELECTRICITY_PRODUCTION_RATE_1, Meter::energy(Direction::FromClient, 1, meter_id)),
            (obis_utils::ELECTRICITY_PRODUCTION_RATE_2, Meter::energy(Direction::FromClient, 2, meter_id)),
        ];

        for (code, meter) in fixed {
            if lines.contains_key(code) {
                meters.insert(code.to_string(), meter);
            }
        }
    }

    /// A bus carries a gas meter when it reports device type 3, an equipment
    /// id and a timestamped volume
    fn detect_gas_meter<'l>(&self, bus: &str, lines: &[(&'l str, &'l str)]) -> Result<(&'l str, Meter), GasDetectionError> {
        let mut is_gas = false;
        let mut identifier = None;
        let mut value_code = None;

        for (code, raw) in lines {
            match obis_utils::code_suffix(code) {
                Some(obis_utils::MBUS_DEVICE_TYPE) => {
                    let device_type = value_parser::parenthesized_value(raw)
                        .and_then(|v| v.trim().parse::<u32>().ok())
                        .ok_or_else(|| GasDetectionError::MalformedValue(code.to_string()))?;
                    if device_type != obis_utils::DEVICE_TYPE_GAS {
                        return Err(GasDetectionError::UnsupportedDeviceType(device_type));
                    }
                    is_gas = true;
                }
                Some(obis_utils::MBUS_EQUIPMENT_ID) => {
                    let id = value_parser::parenthesized_value(raw)
                        .ok_or_else(|| GasDetectionError::MalformedValue(code.to_string()))?;
                    identifier = Some(id);
                }
                Some(obis_utils::MBUS_TIMESTAMPED_VALUE) => value_code = Some(*code),
                _ => {}
            }
        }

        match (is_gas, identifier, value_code) {
            (true, Some(identifier), Some(code)) => Ok((code, Meter::gas(identifier, self.timezone))),
            _ => Err(GasDetectionError::Incomplete(bus.to_string())),
        }
    }
}

/// Text value of a header line, read with the given parser
fn extract_text(lines: &TelegramLines, code: &str, parser: ValueParser) -> Option<String> {
    match parser.parse(lines.get(code)?)?.value {
        Reading::Text(text) => Some(text),
        _ => None,
    }
}

/// Lines per bus id, leaving out the buses of the electricity meter itself
fn group_by_bus(lines: &TelegramLines) -> BTreeMap<&str, Vec<(&str, &str)>> {
    let mut buses: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for (code, raw) in lines {
        if !obis_utils::validate_obis_code(code) {
            debug!("Skipping line with invalid OBIS code {}", code);
            continue;
        }
        let bus = obis_utils::bus_id(code);
        if obis_utils::is_reserved_bus_id(bus) {
            continue;
        }
        buses.entry(bus).or_default().push((code.as_str(), raw.as_str()));
    }
    buses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_p1::sample_telegrams::{DSMR3_TELEGRAM, DSMR42_TELEGRAM, DSMR5_TELEGRAM};
    use crate::models::{Kind, MeterType, Unit};

    fn lines(entries: &[(&str, &str)]) -> TelegramLines {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn with_header(entries: &[(&str, &str)]) -> TelegramLines {
        let mut l = lines(&[("1-3:0.2.8", "(50)"), ("0-0:96.1.1", "(E0001)")]);
        l.extend(lines(entries));
        l
    }

    #[test]
    fn test_detects_dsmr42_meters() {
        let parser = ParserFactory::default().create(DSMR42_TELEGRAM).unwrap();
        let dialect = parser.dialect();
        assert_eq!(dialect.version, "DSMR-42");
        assert_eq!(dialect.vendor_information, "ISk5\\2MT382-1000");
        assert_eq!(dialect.meter_identifier, "4B384547303034303436333935353037");
        assert_eq!(dialect.timezone, P1Timezone::default());

        let mapping = parser.mapping();
        assert_eq!(mapping.len(), 7);
        let rate2 = mapping.get("1-0:1.8.2").unwrap();
        assert_eq!(rate2.tariff(), 2);
        assert_eq!(rate2.unit(), Unit::KilowattHour);
        assert_eq!(rate2.identifier(), "4B384547303034303436333935353037");
        let production = mapping.get("1-0:2.7.0").unwrap();
        assert_eq!(production.direction(), Direction::FromClient);
        assert_eq!(production.meter_type(), MeterType::Instantaneous);
    }

    #[test]
    fn test_identical_telegrams_give_identical_mappings() {
        let factory = ParserFactory::default();
        let a = factory.create(DSMR42_TELEGRAM).unwrap();
        let b = factory.create(DSMR42_TELEGRAM).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_only_present_fixed_codes_are_registered() {
        let parser = ParserFactory::default()
            .create_from_lines(&with_header(&[("1-0:1.8.1", "(000001.000*kWh)")]), "")
            .unwrap();
        assert_eq!(parser.mapping().len(), 1);
        assert!(parser.mapping().contains("1-0:1.8.1"));
    }

    #[test]
    fn test_missing_meter_identifier_fails() {
        let factory = ParserFactory::default();
        let telegram = DSMR42_TELEGRAM.replace("0-0:96.1.1(4B384547303034303436333935353037)\r\n", "");
        assert!(matches!(factory.create(&telegram), Err(DetectionError::MissingMeterIdentifier)));

        let l = lines(&[("1-3:0.2.8", "(42)"), ("1-0:1.8.1", "(000001.000*kWh)")]);
        assert!(matches!(factory.create_from_lines(&l, ""), Err(DetectionError::MissingMeterIdentifier)));
    }

    #[test]
    fn test_missing_version_fails_without_override() {
        assert!(matches!(
            ParserFactory::default().create(DSMR3_TELEGRAM),
            Err(DetectionError::MissingVersion)
        ));

        let parser = ParserFactory::new(P1Timezone::default(), Some("30".to_string()))
            .create(DSMR3_TELEGRAM)
            .unwrap();
        assert_eq!(parser.dialect().version, "DSMR-30");
        assert_eq!(parser.dialect().vendor_information, "KFM5KAIFA-METER");
    }

    #[test]
    fn test_malformed_header_values_are_not_accepted() {
        let l = lines(&[("1-3:0.2.8", "(4.2)"), ("0-0:96.1.1", "(E0001)")]);
        assert!(matches!(
            ParserFactory::default().create_from_lines(&l, ""),
            Err(DetectionError::MissingVersion)
        ));

        let l = lines(&[("1-3:0.2.8", "(50)"), ("0-0:96.1.1", "()")]);
        assert!(matches!(
            ParserFactory::default().create_from_lines(&l, ""),
            Err(DetectionError::MissingMeterIdentifier)
        ));
    }

    #[test]
    fn test_header_values_read_as_text() {
        let l = lines(&[("1-3:0.2.8", "(50)"), ("0-0:96.1.1", "(E0001)")]);
        assert_eq!(extract_text(&l, obis_utils::DSMR_VERSION, ValueParser::DsmrVersion), Some("50".to_string()));
        assert_eq!(extract_text(&l, obis_utils::SMART_METER_ID, ValueParser::MeterIdentifier), Some("E0001".to_string()));
        assert_eq!(extract_text(&l, obis_utils::TIMESTAMP, ValueParser::MeterIdentifier), None);
        // a parser producing numbers yields no header text
        assert_eq!(extract_text(&l, obis_utils::DSMR_VERSION, ValueParser::Kwh), None);
    }

    #[test]
    fn test_override_wins_over_detected_version() {
        let parser = ParserFactory::new(P1Timezone::default(), Some("40".to_string()))
            .create(DSMR42_TELEGRAM)
            .unwrap();
        assert_eq!(parser.dialect().version, "DSMR-40");
    }

    #[test]
    fn test_gas_bus_detection() {
        let l = with_header(&[
            ("0-1:24.1.0", "(3)"),
            ("0-1:96.1.0", "(G1234567)"),
            ("0-1:24.2.1", "(210101120000S)(00123.456*m3)"),
        ]);
        let parser = ParserFactory::default().create_from_lines(&l, "").unwrap();
        assert_eq!(parser.mapping().len(), 1);
        let gas = parser.mapping().get("0-1:24.2.1").unwrap();
        assert_eq!(gas.kind(), Kind::Gas);
        assert_eq!(gas.unit(), Unit::CubicMeter);
        assert_eq!(gas.meter_type(), MeterType::Integral);
        assert_eq!(gas.direction(), Direction::ToClient);
        assert_eq!(gas.identifier(), "G1234567");
    }

    #[test]
    fn test_other_device_type_registers_nothing() {
        let l = with_header(&[
            ("0-1:24.1.0", "(7)"),
            ("0-1:96.1.0", "(G1234567)"),
            ("0-1:24.2.1", "(210101120000S)(00123.456*m3)"),
        ]);
        let parser = ParserFactory::default().create_from_lines(&l, "").unwrap();
        assert!(parser.mapping().is_empty());
    }

    #[test]
    fn test_malformed_or_incomplete_bus_is_skipped() {
        let malformed = with_header(&[
            ("0-1:24.1.0", "(gas)"),
            ("0-1:96.1.0", "(G1)"),
            ("0-1:24.2.1", "(210101120000S)(00123.456*m3)"),
        ]);
        assert!(ParserFactory::default().create_from_lines(&malformed, "").unwrap().mapping().is_empty());

        let incomplete = with_header(&[("0-2:24.1.0", "(3)"), ("0-2:24.2.1", "(210101120000S)(00123.456*m3)")]);
        assert!(ParserFactory::default().create_from_lines(&incomplete, "").unwrap().mapping().is_empty());
    }

    #[test]
    fn test_two_gas_buses() {
        let l = with_header(&[
            ("0-1:24.1.0", "(3)"),
            ("0-1:96.1.0", "(G1)"),
            ("0-1:24.2.1", "(210101120000S)(00001.000*m3)"),
            ("0-2:24.1.0", "(3)"),
            ("0-2:96.1.0", "(G2)"),
            ("0-2:24.2.1", "(210101120000S)(00002.000*m3)"),
        ]);
        let parser = ParserFactory::default().create_from_lines(&l, "").unwrap();
        assert_eq!(parser.mapping().get("0-1:24.2.1").unwrap().identifier(), "G1");
        assert_eq!(parser.mapping().get("0-2:24.2.1").unwrap().identifier(), "G2");
    }

    #[test]
    fn test_reserved_bus_ids_are_never_sub_meters() {
        for bus in ["1-3", "0-0", "1-0"] {
            let codes = [format!("{}:24.1.0", bus), format!("{}:96.1.0", bus), format!("{}:24.2.1", bus)];
            let l = with_header(&[
                (codes[0].as_str(), "(3)"),
                (codes[1].as_str(), "(G1)"),
                (codes[2].as_str(), "(210101120000S)(00001.000*m3)"),
            ]);
            let parser = ParserFactory::default().create_from_lines(&l, "").unwrap();
            assert!(parser.mapping().is_empty(), "bus {} produced a meter", bus);
        }
    }

    #[test]
    fn test_dsmr5_without_gas() {
        let telegram = String::from_utf8_lossy(DSMR5_TELEGRAM);
        let parser = ParserFactory::default().create(&telegram).unwrap();
        assert_eq!(parser.mapping().len(), 6);
        assert!(parser.mapping().meters().all(|m| m.kind() == Kind::Electricity));
    }
}
