//! Number formatting for Heidenhain plain-language words
//!
//! Every function is total: a non-finite input is "no value", never a panic
//! and never silently a zero coordinate.

/// Fixed feed word written on every rapid move
pub const RAPID_FEED: i64 = 9999;

/// `X+12.500`, `Z-3.000`. The sign is always explicit.
pub fn format_signed_coordinate(letter: char, value: f64, decimals: usize) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    // -0.0 would print as "-0.000"
    let value = if value == 0.0 { 0.0 } else { value };
    Some(format!("{}{:+.*}", letter, decimals, value))
}

/// Nearest integer feed number (ties to even)
pub fn format_feed_integer(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round_ties_even() as i64)
}

/// Integer feed after scaling, e.g. mm/s to mm/min with `scale = 60`
pub fn format_feed_scaled(value: f64, scale: f64) -> Option<i64> {
    format_feed_integer(value * scale)
}

/// Always-negative magnitude used for setup clearance and plunge depth fields
pub fn format_negated_magnitude(value: f64) -> String {
    let value = if value.is_finite() { -value.abs() } else { -0.0 };
    format!("{:+.3}", value)
}

/// Signed fixed point without address letter: `+5.000`, `-5.000`
pub fn format_signed_fixed(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{:+.3}", value)
}

/// Dwell time with a decimal comma, as the control expects: `1,500`
pub fn format_dwell_comma_decimal(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{:.*}", decimals, value).replace('.', ",")
}
