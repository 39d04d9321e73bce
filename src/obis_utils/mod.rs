use std::collections::HashMap;

/// DSMR specific OBIS codes the parser reacts to
pub const TIMESTAMP: &str = "0-0:1.0.0";
pub const DSMR_VERSION: &str = "1-3:0.2.8";
pub const SMART_METER_ID: &str = "0-0:96.1.1";
pub const ELECTRICITY_CONSUMPTION_RATE_1: &str = "1-0:1.8.1";
pub const ELECTRICITY_CONSUMPTION_RATE_2: &str = "1-0:1.8.2";
pub const ELECTRICITY_PRODUCTION_RATE_1: &str = "1-0:2.8.1";
pub const ELECTRICITY_PRODUCTION_RATE_2: &str = "1-0:2.8.2";
pub const ELECTRICITY_CURRENT_POWER_CONSUMPTION: &str = "1-0:1.7.0";
pub const ELECTRICITY_CURRENT_POWER_PRODUCTION: &str = "1-0:2.7.0";

/// Suffixes of the M-Bus sub meter lines (after the bus id)
pub const MBUS_DEVICE_TYPE: &str = "24.1.0";
pub const MBUS_EQUIPMENT_ID: &str = "96.1.0";
pub const MBUS_TIMESTAMPED_VALUE: &str = "24.2.1";

/// Bus ids that belong to the electricity meter itself and never carry sub meters
pub const RESERVED_BUS_IDS: [&str; 3] = ["1-3", "0-0", "1-0"];

/// M-Bus device type of a gas meter
pub const DEVICE_TYPE_GAS: u32 = 3;

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    let descriptions = get_dsmr_obis_descriptions();
    descriptions.get(obis_code).copied()
}

pub fn get_dsmr_obis_descriptions() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();

    // Header lines
    map.insert(DSMR_VERSION, "DSMR version");
    map.insert(TIMESTAMP, "Date and time");
    map.insert(SMART_METER_ID, "Equipment identifier");
    map.insert("0-0:96.14.0", "Tariff indicator");

    // Energy values
    map.insert(ELECTRICITY_CONSUMPTION_RATE_1, "Active energy + (tariff 1)");
    map.insert(ELECTRICITY_CONSUMPTION_RATE_2, "Active energy + (tariff 2)");
    map.insert(ELECTRICITY_PRODUCTION_RATE_1, "Active energy - (tariff 1)");
    map.insert(ELECTRICITY_PRODUCTION_RATE_2, "Active energy - (tariff 2)");

    // Power values
    map.insert(ELECTRICITY_CURRENT_POWER_CONSUMPTION, "Active power + (total)");
    map.insert(ELECTRICITY_CURRENT_POWER_PRODUCTION, "Active power - (total)");
    map.insert("1-0:21.7.0", "Active power + (L1)");
    map.insert("1-0:41.7.0", "Active power + (L2)");
    map.insert("1-0:61.7.0", "Active power + (L3)");

    // Power quality
    map.insert("0-0:96.7.21", "Number of power failures");
    map.insert("0-0:96.7.9", "Number of long power failures");
    map.insert("1-0:99.97.0", "Power failure event log");
    map.insert("1-0:32.32.0", "Number of voltage sags (L1)");
    map.insert("1-0:32.36.0", "Number of voltage swells (L1)");
    map.insert("1-0:31.7.0", "Current (L1)");
    map.insert("1-0:32.7.0", "Voltage (L1)");

    // M-Bus sub meters on channel 1
    map.insert("0-1:24.1.0", "M-Bus device type");
    map.insert("0-1:96.1.0", "M-Bus equipment identifier");
    map.insert("0-1:24.2.1", "M-Bus last reading with capture time");
    map.insert("0-1:24.3.0", "M-Bus last hourly reading (DSMR 3)");

    map
}

/// The bus id is everything in front of the ':' (e.g. `0-1` for `0-1:24.2.1`)
pub fn bus_id(code: &str) -> &str {
    match code.split_once(':') {
        Some((bus, _)) => bus,
        None => code,
    }
}

/// The part behind the bus id, if there is one
pub fn code_suffix(code: &str) -> Option<&str> {
    code.split_once(':').map(|(_, suffix)| suffix)
}

pub fn is_reserved_bus_id(bus: &str) -> bool {
    RESERVED_BUS_IDS.contains(&bus)
}

pub fn validate_obis_code(code: &str) -> bool {
    // OBIS code format: A-B:C.D.E*F
    // A: Medium (0=abstract, 1=electricity, 6=heat, 7=gas, 8=water)
    // B: Channel (0-15)
    // C: Physical value (1-255)
    // D: Processing method (0-255)
    // E: Tariff/Time (0-255)
    // F: Storage (optional, 0-255)

    let Some((ab_part, cde_part)) = code.split_once(':') else {
        return false;
    };

    let ab_parts: Vec<&str> = ab_part.split('-').collect();
    if ab_parts.len() != 2 {
        return false;
    }

    let cde_part = cde_part.split('*').next().unwrap_or("");
    let cde_parts: Vec<&str> = cde_part.split('.').collect();
    if cde_parts.len() != 3 {
        return false;
    }

    ab_parts
        .iter()
        .chain(cde_parts.iter())
        .all(|part| part.parse::<u8>().is_ok())
}

pub fn normalize_obis_code(code: &str) -> String {
    code.trim().to_string()
}
