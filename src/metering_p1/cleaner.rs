use log::debug;
use std::collections::BTreeMap;

use crate::obis_utils;

/// OBIS code -> raw value text (everything from the first '(' on)
pub type TelegramLines = BTreeMap<String, String>;

/// Strip carriage returns and put DSMR 3 gas readings back on one line.
///
/// Old meters wrap the gas value of `0-1:24.3.0(...)(m3)` onto the next
/// physical line.
pub fn normalize(source: &str) -> String {
    source.replace('\r', "").replace("(m3)\n", "(m3)")
}

pub fn as_lines(source: &str) -> Vec<String> {
    normalize(source).split('\n').map(str::to_string).collect()
}

/// The banner without its leading '/', e.g. `ISk5\2MT382-1000`
pub fn vendor_information(source: &str) -> Option<String> {
    let lines = as_lines(source);
    let first = lines.first()?;
    first.strip_prefix('/').map(str::to_string)
}

/// Split a telegram into its data lines. Lines without a value (banner,
/// blank lines, the closing '!') are skipped; a code that shows up twice
/// keeps its last value.
pub fn split_telegram(source: &str) -> TelegramLines {
    let mut lines = TelegramLines::new();
    for line in as_lines(source) {
        let Some(paren_start) = line.find('(') else {
            continue;
        };
        let code = obis_utils::normalize_obis_code(&line[..paren_start]);
        let value = line[paren_start..].trim_end().to_string();
        if let Some(previous) = lines.insert(code.clone(), value) {
            debug!("{} appears more than once, dropping earlier value {}", code, previous);
        }
    }
    lines
}
