//! Locale-tolerant numeric parsing for OCR tokens
//!
//! Instrument displays print decimals with a comma and coordinates with a
//! degree sign; OCR also tends to confuse `°` with the ordinal indicator `º`.

use std::num::ParseFloatError;

/// Characters OCR produces for a degree sign
pub const DEGREE_SIGNS: [char; 2] = ['°', 'º'];

/// Strip degree signs and turn a decimal comma into a decimal dot
pub fn normalize_decimal(token: &str) -> String {
    token
        .trim()
        .chars()
        .filter(|c| !DEGREE_SIGNS.contains(c))
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Parse an OCR numeric token such as `49,7220°` or `415.943`
pub fn parse_decimal(token: &str) -> Result<f64, ParseFloatError> {
    normalize_decimal(token).parse::<f64>()
}

/// Render the magnitude of a value the way the display prints it (`49,722`)
///
/// Rust prints the shortest representation that round-trips, so the result is
/// a prefix of the digits OCR read (trailing zeros dropped).
pub fn to_decimal_comma(value: f64) -> String {
    value.abs().to_string().replace('.', ",")
}
