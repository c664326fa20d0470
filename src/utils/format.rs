//! Human-readable rendering of token amounts.
//!
//! Amounts stay exact `U256` base units everywhere else; floating point appears
//! only here, on the way to a display string.

use alloy_primitives::U256;
use chrono::{DateTime, TimeZone};

/// Base units to whole-token value, e.g. `1500000000000000000` at 18 decimals is `1.5`.
pub fn to_display_units(amount: U256, decimals: u8) -> f64 {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    let text = if decimals == 0 {
        digits
    } else if digits.len() > decimals {
        let (whole, frac) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", whole, frac)
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    };
    text.parse().unwrap_or(f64::MAX)
}

/// Compact number: `1.23B`, `45.60M`, `7.89K`, or `123.45` below a thousand.
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    if value >= 1e9 {
        format!("{:.*}B", decimals, value / 1e9)
    } else if value >= 1e6 {
        format!("{:.*}M", decimals, value / 1e6)
    } else if value >= 1e3 {
        format!("{:.*}K", decimals, value / 1e3)
    } else {
        group_thousands(&format!("{:.*}", decimals, value))
    }
}

pub fn format_optional(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format_number(v, decimals))
}

/// `format_number` of the whole-token value followed by the symbol.
pub fn format_token_amount(amount: U256, decimals: u8, symbol: &str) -> String {
    format!("{} {}", format_number(to_display_units(amount, decimals), 2), symbol)
}

/// Integer with thousands separators, e.g. `12,345`.
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// `Oct 18, 2026, 03:04:05 PM`
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%b %-d, %Y, %I:%M:%S %p").to_string()
}

fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(idx) => unsigned.split_at(idx),
        None => (unsigned, ""),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use chrono::Utc;

    fn tokens(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(18u8))
    }

    /// Inverse of `format_number` for the monotonicity check.
    fn parse_display(s: &str) -> f64 {
        let s = s.replace(',', "");
        let (num, scale) = match s.chars().last() {
            Some('B') => (&s[..s.len() - 1], 1e9),
            Some('M') => (&s[..s.len() - 1], 1e6),
            Some('K') => (&s[..s.len() - 1], 1e3),
            _ => (s.as_str(), 1.0),
        };
        num.parse::<f64>().unwrap() * scale
    }

    #[test]
    fn test_display_units() {
        assert_approx_eq!(to_display_units(tokens(1), 18), 1.0);
        assert_approx_eq!(to_display_units(U256::from(15u8), 1), 1.5);
        assert_approx_eq!(to_display_units(U256::from(5u8), 3), 0.005);
        assert_eq!(to_display_units(U256::ZERO, 18), 0.0);
        assert_approx_eq!(to_display_units(U256::from(42u8), 0), 42.0);
    }

    #[test]
    fn test_format_number_suffixes() {
        assert_eq!(format_number(1_234_000_000.0, 2), "1.23B");
        assert_eq!(format_number(450_000_000.0, 2), "450.00M");
        assert_eq!(format_number(7_890.0, 2), "7.89K");
        assert_eq!(format_number(123.456, 2), "123.46");
        assert_eq!(format_number(f64::NAN, 2), "-");
        assert_eq!(format_optional(None, 2), "-");
    }

    #[test]
    fn test_zero_renders_as_zero_value() {
        assert_eq!(format_token_amount(U256::ZERO, 18, "FULA"), "0.00 FULA");
    }

    #[test]
    fn test_format_is_monotonic() {
        let unit = U256::from(10u64).pow(U256::from(16u8)); // 0.01 token
        let mut amounts: Vec<U256> = Vec::new();
        for whole in [0u64, 1, 999, 1_000, 999_994, 999_995, 999_999, 1_000_000, 999_999_999, 1_000_000_000] {
            for cents in [0u64, 1, 49, 50, 99] {
                amounts.push(tokens(whole) + unit * U256::from(cents));
            }
        }
        amounts.sort();

        let mut previous = -1.0;
        for amount in amounts {
            let shown = parse_display(&format_number(to_display_units(amount, 18), 2));
            assert!(shown >= previous, "{} rendered below its predecessor", amount);
            previous = shown;
        }
    }

    #[test]
    fn test_thousands_grouping() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(12_345), "12,345");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(group_thousands("-1234.50"), "-1,234.50");
    }

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 15, 4, 5).unwrap();
        assert_eq!(format_timestamp(&at), "Oct 18, 2026, 03:04:05 PM");
    }
}
