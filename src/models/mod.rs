use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::metering_p1::value_parser::{P1Timezone, ValueParser};

/// Direction of the energy flow as seen from the grid operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    ToClient,
    FromClient,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Electricity,
    Gas,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unit {
    KilowattHour,
    Watt,
    CubicMeter,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::KilowattHour => "kWh",
            Unit::Watt => "W",
            Unit::CubicMeter => "m3",
        }
    }
}

/// Integral meters count up forever, instantaneous ones report the current rate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeterType {
    Integral,
    Instantaneous,
}

/// A typed value read from a telegram line
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum Reading {
    KilowattHours(f64),
    Watts(f64),
    CubicMeters(f64),
    Text(String),
}

impl Reading {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::KilowattHours(v) | Reading::Watts(v) | Reading::CubicMeters(v) => Some(*v),
            Reading::Text(_) => None,
        }
    }

    pub fn unit(&self) -> Option<Unit> {
        match self {
            Reading::KilowattHours(_) => Some(Unit::KilowattHour),
            Reading::Watts(_) => Some(Unit::Watt),
            Reading::CubicMeters(_) => Some(Unit::CubicMeter),
            Reading::Text(_) => None,
        }
    }
}

// Numbers compare by total order so that readings can live in hash sets
impl PartialEq for Reading {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Reading::KilowattHours(a), Reading::KilowattHours(b))
            | (Reading::Watts(a), Reading::Watts(b))
            | (Reading::CubicMeters(a), Reading::CubicMeters(b)) => a.total_cmp(b) == Ordering::Equal,
            (Reading::Text(a), Reading::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Reading {}

impl Hash for Reading {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Reading::KilowattHours(v) | Reading::Watts(v) | Reading::CubicMeters(v) => v.to_bits().hash(state),
            Reading::Text(t) => t.hash(state),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::KilowattHours(v) | Reading::Watts(v) | Reading::CubicMeters(v) => {
                let unit = self.unit().map(|u| u.symbol()).unwrap_or_default();
                write!(f, "{} {}", v, unit)
            }
            Reading::Text(t) => write!(f, "{}", t),
        }
    }
}

/// A single metering quantity reported by the smart meter (or one of its
/// M-Bus sub meters), bound to the parser that reads its value.
///
/// Meters are only created through the constructors below and never change
/// afterwards. Equality and hashing cover everything but the parser.
#[derive(Debug, Clone, Serialize)]
pub struct Meter {
    channel: Option<String>,
    direction: Direction,
    unit: Unit,
    kind: Kind,
    meter_type: MeterType,
    tariff: u8,
    identifier: String,
    #[serde(skip)]
    parser: ValueParser,
}

impl Meter {
    /// Cumulative electricity counter for one tariff
    pub fn energy(direction: Direction, tariff: u8, identifier: &str) -> Self {
        Self {
            channel: None,
            direction,
            unit: Unit::KilowattHour,
            kind: Kind::Electricity,
            meter_type: MeterType::Integral,
            tariff,
            identifier: identifier.to_string(),
            parser: ValueParser::Kwh,
        }
    }

    /// Instantaneous power over all phases
    pub fn power(direction: Direction, identifier: &str) -> Self {
        Self {
            channel: Some("Total".to_string()),
            direction,
            unit: Unit::Watt,
            kind: Kind::Electricity,
            meter_type: MeterType::Instantaneous,
            tariff: 0,
            identifier: identifier.to_string(),
            parser: ValueParser::Watt,
        }
    }

    /// Gas meter attached to the M-Bus, reporting volume with its own capture time
    pub fn gas(identifier: &str, timezone: P1Timezone) -> Self {
        Self {
            channel: None,
            direction: Direction::ToClient,
            unit: Unit::CubicMeter,
            kind: Kind::Gas,
            meter_type: MeterType::Integral,
            tariff: 0,
            identifier: identifier.to_string(),
            parser: ValueParser::TimestampedCubicMeter(timezone),
        }
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn meter_type(&self) -> MeterType {
        self.meter_type
    }

    /// 0 when the meter is not tariff specific
    pub fn tariff(&self) -> u8 {
        self.tariff
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn parser(&self) -> &ValueParser {
        &self.parser
    }

    /// Parse `raw` with the bound parser; the value's own capture time wins over
    /// the telegram timestamp.
    pub fn extract_measurement(&self, telegram_timestamp: DateTime<Utc>, raw: &str) -> Option<Measurement<'_>> {
        let parsed = self.parser.parse(raw)?;
        Some(Measurement {
            timestamp: parsed.timestamp.unwrap_or(telegram_timestamp),
            meter: self,
            value: parsed.value,
        })
    }

    fn sort_key(&self) -> (Kind, Direction, MeterType, u8, &str) {
        (self.kind, self.direction, self.meter_type, self.tariff, &self.identifier)
    }
}

impl PartialEq for Meter {
    fn eq(&self, other: &Self) -> bool {
        self.channel == other.channel
            && self.direction == other.direction
            && self.unit == other.unit
            && self.kind == other.kind
            && self.meter_type == other.meter_type
            && self.tariff == other.tariff
            && self.identifier == other.identifier
    }
}

impl Eq for Meter {}

impl Hash for Meter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.channel.hash(state);
        self.direction.hash(state);
        self.unit.hash(state);
        self.kind.hash(state);
        self.meter_type.hash(state);
        self.tariff.hash(state);
        self.identifier.hash(state);
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {:?} in {}", self.kind, self.meter_type, self.direction, self.unit.symbol())?;
        if self.tariff != 0 {
            write!(f, " tariff {}", self.tariff)?;
        }
        write!(f, " ({})", self.identifier)
    }
}

/// OBIS code -> meter table, built once by the parser factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterMapping {
    meters: HashMap<String, Meter>,
}

impl MeterMapping {
    pub fn new(meters: HashMap<String, Meter>) -> Self {
        Self { meters }
    }

    pub fn get(&self, obis_code: &str) -> Option<&Meter> {
        self.meters.get(obis_code)
    }

    pub fn contains(&self, obis_code: &str) -> bool {
        self.meters.contains_key(obis_code)
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Meter)> {
        self.meters.iter().map(|(code, meter)| (code.as_str(), meter))
    }

    /// Entries sorted by OBIS code
    pub fn sorted(&self) -> Vec<(&str, &Meter)> {
        let mut entries: Vec<(&str, &Meter)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn meters(&self) -> impl Iterator<Item = &Meter> {
        self.meters.values()
    }
}

/// One parsed value of one telegram, pointing back into the meter mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Measurement<'a> {
    pub timestamp: DateTime<Utc>,
    pub meter: &'a Meter,
    pub value: Reading,
}

impl<'a> Measurement<'a> {
    /// Order for presentation: kind, direction, meter type, tariff
    pub fn sort(measurements: &HashSet<Measurement<'a>>) -> Vec<Measurement<'a>> {
        let mut sorted: Vec<Measurement<'a>> = measurements.iter().cloned().collect();
        sorted.sort_by(|a, b| a.meter.sort_key().cmp(&b.meter.sort_key()));
        sorted
    }
}

impl fmt::Display for Measurement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: {}", self.meter, self.timestamp, self.value)
    }
}

/// The well known quantities of one telegram as named fields.
/// Tariff 1 is the low rate, tariff 2 the normal rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementSummary {
    pub timestamp: Option<DateTime<Utc>>,
    pub electricity_consumption_low_rate_kwh: Option<f64>,
    pub electricity_consumption_normal_rate_kwh: Option<f64>,
    pub electricity_production_low_rate_kwh: Option<f64>,
    pub electricity_production_normal_rate_kwh: Option<f64>,
    pub current_power_consumption_w: Option<f64>,
    pub current_power_production_w: Option<f64>,
    pub gas_consumption_m3: Option<f64>,
    pub gas_timestamp: Option<DateTime<Utc>>,
}

impl MeasurementSummary {
    pub fn from_measurements(measurements: &HashSet<Measurement<'_>>) -> Self {
        let mut summary = MeasurementSummary::default();

        for m in measurements {
            let meter = m.meter;
            let value = m.value.as_f64();
            match (meter.kind(), meter.meter_type(), meter.direction(), meter.tariff()) {
                (Kind::Electricity, MeterType::Integral, Direction::ToClient, 1) => {
                    summary.electricity_consumption_low_rate_kwh = value
                }
                (Kind::Electricity, MeterType::Integral, Direction::ToClient, 2) => {
                    summary.electricity_consumption_normal_rate_kwh = value
                }
                (Kind::Electricity, MeterType::Integral, Direction::FromClient, 1) => {
                    summary.electricity_production_low_rate_kwh = value
                }
                (Kind::Electricity, MeterType::Integral, Direction::FromClient, 2) => {
                    summary.electricity_production_normal_rate_kwh = value
                }
                (Kind::Electricity, MeterType::Instantaneous, Direction::ToClient, _) => {
                    summary.current_power_consumption_w = value
                }
                (Kind::Electricity, MeterType::Instantaneous, Direction::FromClient, _) => {
                    summary.current_power_production_w = value
                }
                (Kind::Gas, _, _, _) => {
                    summary.gas_consumption_m3 = value;
                    summary.gas_timestamp = Some(m.timestamp);
                    continue;
                }
                _ => continue,
            }
            if meter.direction() == Direction::ToClient {
                summary.timestamp = Some(m.timestamp);
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_meter_equality_ignores_parser() {
        let a = Meter::gas("G1", P1Timezone::default());
        let b = Meter::gas("G1", P1Timezone::parse("UTC").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, Meter::gas("G2", P1Timezone::default()));
        assert_ne!(
            Meter::energy(Direction::ToClient, 1, "E1"),
            Meter::energy(Direction::ToClient, 2, "E1")
        );
    }

    #[test]
    fn test_power_meter_shape() {
        let meter = Meter::power(Direction::FromClient, "E1");
        assert_eq!(meter.channel(), Some("Total"));
        assert_eq!(meter.unit(), Unit::Watt);
        assert_eq!(meter.meter_type(), MeterType::Instantaneous);
        assert_eq!(meter.tariff(), 0);
    }

    #[test]
    fn test_extract_measurement_prefers_value_timestamp() {
        let telegram_ts = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();

        let energy = Meter::energy(Direction::ToClient, 1, "E1");
        let m = energy.extract_measurement(telegram_ts, "(000123.456*kWh)").unwrap();
        assert_eq!(m.timestamp, telegram_ts);
        assert_eq!(m.value, Reading::KilowattHours(123.456));

        let gas = Meter::gas("G1", P1Timezone::default());
        let m = gas.extract_measurement(telegram_ts, "(210101110000W)(00042.000*m3)").unwrap();
        assert_eq!(m.timestamp, Utc.with_ymd_and_hms(2021, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(m.value, Reading::CubicMeters(42.0));

        assert!(energy.extract_measurement(telegram_ts, "(nonsense)").is_none());
    }

    #[test]
    fn test_reading_equality_per_kind() {
        assert_eq!(Reading::Watts(350.0), Reading::Watts(350.0));
        assert_ne!(Reading::Watts(350.0), Reading::KilowattHours(350.0));
        assert_eq!(Reading::Text("a".into()), Reading::Text("a".into()));
        assert_eq!(Reading::CubicMeters(1.5).to_string(), "1.5 m3");
    }

    #[test]
    fn test_summary_from_measurements() {
        let ts = Utc.with_ymd_and_hms(2021, 1, 1, 11, 0, 0).unwrap();
        let low = Meter::energy(Direction::ToClient, 1, "E1");
        let normal_back = Meter::energy(Direction::FromClient, 2, "E1");
        let power = Meter::power(Direction::ToClient, "E1");
        let gas = Meter::gas("G1", P1Timezone::default());

        let mut set = HashSet::new();
        set.insert(Measurement { timestamp: ts, meter: &low, value: Reading::KilowattHours(1.5) });
        set.insert(Measurement { timestamp: ts, meter: &normal_back, value: Reading::KilowattHours(0.5) });
        set.insert(Measurement { timestamp: ts, meter: &power, value: Reading::Watts(350.0) });
        set.insert(Measurement { timestamp: ts, meter: &gas, value: Reading::CubicMeters(12.0) });

        let summary = MeasurementSummary::from_measurements(&set);
        assert_eq!(summary.timestamp, Some(ts));
        assert_eq!(summary.electricity_consumption_low_rate_kwh, Some(1.5));
        assert_eq!(summary.electricity_consumption_normal_rate_kwh, None);
        assert_eq!(summary.electricity_production_normal_rate_kwh, Some(0.5));
        assert_eq!(summary.current_power_consumption_w, Some(350.0));
        assert_eq!(summary.current_power_production_w, None);
        assert_eq!(summary.gas_consumption_m3, Some(12.0));
        assert_eq!(summary.gas_timestamp, Some(ts));
    }

    #[test]
    fn test_summary_timestamp_comes_from_consumption() {
        let consumed = Utc.with_ymd_and_hms(2021, 1, 1, 11, 0, 0).unwrap();
        let produced = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();
        let low = Meter::energy(Direction::ToClient, 1, "E1");
        let back = Meter::energy(Direction::FromClient, 1, "E1");
        let power_back = Meter::power(Direction::FromClient, "E1");

        let mut set = HashSet::new();
        set.insert(Measurement { timestamp: consumed, meter: &low, value: Reading::KilowattHours(1.5) });
        set.insert(Measurement { timestamp: produced, meter: &back, value: Reading::KilowattHours(0.5) });
        set.insert(Measurement { timestamp: produced, meter: &power_back, value: Reading::Watts(10.0) });
        assert_eq!(MeasurementSummary::from_measurements(&set).timestamp, Some(consumed));

        // production alone leaves the summary without a timestamp
        let mut set = HashSet::new();
        set.insert(Measurement { timestamp: produced, meter: &back, value: Reading::KilowattHours(0.5) });
        let summary = MeasurementSummary::from_measurements(&set);
        assert_eq!(summary.timestamp, None);
        assert_eq!(summary.electricity_production_low_rate_kwh, Some(0.5));
    }

    #[test]
    fn test_mapping_sorted() {
        let mut meters = HashMap::new();
        meters.insert("1-0:1.8.2".to_string(), Meter::energy(Direction::ToClient, 2, "E1"));
        meters.insert("1-0:1.8.1".to_string(), Meter::energy(Direction::ToClient, 1, "E1"));
        let mapping = MeterMapping::new(meters);
        let codes: Vec<&str> = mapping.sorted().into_iter().map(|(code, _)| code).collect();
        assert_eq!(codes, vec!["1-0:1.8.1", "1-0:1.8.2"]);
        assert!(mapping.contains("1-0:1.8.1"));
        assert_eq!(mapping.len(), 2);
    }
}
