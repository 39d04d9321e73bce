use super::utils::{crc16, format_checksum};

/// Landis+Gyr E350, DSMR 5, as captured, checksum trailer included
pub const DSMR5_TELEGRAM: &[u8] = b"/XMX5LGBBFFB231237741\r\n\r\n\
1-3:0.2.8(42)\r\n\
0-0:1.0.0(200208153516W)\r\n\
0-0:96.1.1(4530303034303031383434303034323134)\r\n\
1-0:1.8.1(004436.791*kWh)\r\n\
1-0:2.8.1(000000.000*kWh)\r\n\
1-0:1.8.2(004234.483*kWh)\r\n\
1-0:2.8.2(000000.000*kWh)\r\n\
0-0:96.14.0(0001)\r\n\
1-0:1.7.0(00.329*kW)\r\n\
1-0:2.7.0(00.000*kW)\r\n\
0-0:96.7.21(00002)\r\n\
0-0:96.7.9(00003)\r\n\
1-0:99.97.0(3)(0-0:96.7.19)(180726223917S)(0000006462*s)(170325035658W)(0036416374*s)(160128161754W)(0024464269*s)\r\n\
1-0:32.32.0(00000)\r\n\
1-0:32.36.0(00000)\r\n\
0-0:96.13.1()\r\n\
0-0:96.13.0()\r\n\
1-0:31.7.0(002*A)\r\n\
1-0:21.7.0(00.329*kW)\r\n\
1-0:22.7.0(00.000*kW)\r\n\
!6130\r\n";

/// DSMR 4.2 meter with a gas meter on M-Bus channel 1, up to and including '!'
pub const DSMR42_TELEGRAM: &str = "/ISk5\\2MT382-1000\r\n\r\n\
1-3:0.2.8(42)\r\n\
0-0:1.0.0(210101120000W)\r\n\
0-0:96.1.1(4B384547303034303436333935353037)\r\n\
1-0:1.8.1(000123.456*kWh)\r\n\
1-0:1.8.2(000234.567*kWh)\r\n\
1-0:2.8.1(000012.345*kWh)\r\n\
1-0:2.8.2(000001.234*kWh)\r\n\
0-0:96.14.0(0002)\r\n\
1-0:1.7.0(00.350*kW)\r\n\
1-0:2.7.0(00.000*kW)\r\n\
0-0:96.7.21(00004)\r\n\
0-1:24.1.0(003)\r\n\
0-1:96.1.0(3232323241424344313233343536373839)\r\n\
0-1:24.2.1(210101110000W)(00123.456*m3)\r\n\
!";

/// DSMR 3 (Kaifa) without version line and checksum, gas value wrapped onto
/// its own line
pub const DSMR3_TELEGRAM: &str = "/KFM5KAIFA-METER\r\n\r\n\
0-0:96.1.1(4B413650303035303033393632343132)\r\n\
1-0:1.8.1(000001.234*kWh)\r\n\
1-0:1.8.2(000002.345*kWh)\r\n\
1-0:2.8.1(000000.000*kWh)\r\n\
1-0:2.8.2(000000.000*kWh)\r\n\
0-0:96.14.0(0001)\r\n\
1-0:1.7.0(0000.55*kW)\r\n\
1-0:2.7.0(0000.00*kW)\r\n\
0-1:24.1.0(3)\r\n\
0-1:96.1.0(3238313031353431303034303232323131)\r\n\
0-1:24.3.0(121030140000)(00)(60)(1)(0-1:24.2.1)(m3)\r\n\
(00000.000)\r\n\
!\r\n";

/// Append a correct CRC trailer and line end to a telegram ending in '!'
pub fn with_checksum(telegram: &str) -> String {
    format!("{}{}\r\n", telegram, format_checksum(crc16(telegram.as_bytes())))
}
