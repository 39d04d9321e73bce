/// CRC16 as used by DSMR telegrams (polynomial 0xA001 reflected, seed 0).
/// Covers every byte from the leading '/' up to and including the '!'.
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ byte as u16;
    for _ in 0..8 {
        if crc & 1 != 0 {
            crc = (crc >> 1) ^ 0xA001;
        } else {
            crc >>= 1;
        }
    }
    crc
}

pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, byte| crc16_update(crc, *byte))
}

/// Telegram trailer representation of a checksum
pub fn format_checksum(crc: u16) -> String {
    format!("{:04X}", crc)
}

/// Four hex digits, nothing else (no sign, no whitespace)
pub fn parse_checksum(text: &[u8]) -> Option<u16> {
    if text.len() != 4 || !text.iter().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let text = std::str::from_utf8(text).ok()?;
    u16::from_str_radix(text, 16).ok()
}
