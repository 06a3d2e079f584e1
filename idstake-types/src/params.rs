//! Staking policy constants and fixed-point helpers.

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;

/// Shortest lock a stake or extension may request.
pub const MIN_LOCK_DURATION: u64 = 12 * SECONDS_PER_WEEK;
/// Longest lock a stake or extension may request.
pub const MAX_LOCK_DURATION: u64 = 104 * SECONDS_PER_WEEK;
/// Default minimum time between two round advances.
pub const DEFAULT_ROUND_DURATION: u64 = 90 * SECONDS_PER_DAY;

pub const MAX_PERCENT: u64 = 100;

pub const TOKEN_DECIMALS: u32 = 18;
/// One whole token in base units.
pub const UNIT: u128 = 10u128.pow(TOKEN_DECIMALS);

/// Renders a base-unit amount as a decimal token string, trimming trailing zeros.
pub fn format_units(amount: u128) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parses a decimal token string ("12", "0.5") into base units.
pub fn parse_units(s: &str) -> Option<u128> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > TOKEN_DECIMALS as usize {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = TOKEN_DECIMALS as usize);
        padded.parse().ok()?
    };
    whole.checked_mul(UNIT)?.checked_add(frac_units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_bounds_are_in_weeks() {
        assert_eq!(MIN_LOCK_DURATION, 7_257_600);
        assert_eq!(MAX_LOCK_DURATION, 62_899_200);
    }

    #[test]
    fn units_format_and_parse() {
        assert_eq!(format_units(10 * UNIT), "10");
        assert_eq!(format_units(UNIT / 2), "0.5");
        assert_eq!(parse_units("10"), Some(10 * UNIT));
        assert_eq!(parse_units("0.25"), Some(UNIT / 4));
        assert_eq!(parse_units(".5"), Some(UNIT / 2));
        assert_eq!(parse_units("1.0000000000000000001"), None);
        assert_eq!(parse_units("abc"), None);
        assert_eq!(parse_units(""), None);
        assert_eq!(parse_units("1.+5"), None);
        assert_eq!(parse_units("1.+"), None);
        assert_eq!(parse_units("+1"), None);
        assert_eq!(parse_units("-1"), None);
        assert_eq!(parse_units("1.-5"), None);
        assert_eq!(parse_units("1.5"), Some(3 * UNIT / 2));
    }
}
