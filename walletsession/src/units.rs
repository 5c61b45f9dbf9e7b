use alloy_primitives::{U256, utils::format_units};

/// Formats a native balance in smallest units as a decimal string.
///
/// Trailing zeros are trimmed but at least one fractional digit is kept, so a
/// whole amount reads `1.0` and zero reads `0.0`.
pub fn format_native_amount(raw: U256, decimals: u8) -> String {
    let formatted = format_units(raw, decimals).unwrap_or_else(|_| raw.to_string());
    trim_fraction(formatted)
}

fn trim_fraction(s: String) -> String {
    match s.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{s}.0"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fractional_ether() {
        let wei = U256::from(2_500_000_000_000_000_000u128);
        assert_eq!(format_native_amount(wei, 18), "2.5");
    }

    #[test]
    fn test_format_whole_amount_keeps_one_decimal() {
        let wei = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(format_native_amount(wei, 18), "1.0");
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(format_native_amount(U256::ZERO, 18), "0.0");
    }

    #[test]
    fn test_format_dust() {
        assert_eq!(format_native_amount(U256::from(1u64), 18), "0.000000000000000001");
    }

    #[test]
    fn test_format_other_decimals() {
        assert_eq!(format_native_amount(U256::from(12_345_678u64), 6), "12.345678");
        assert_eq!(format_native_amount(U256::from(42u64), 0), "42.0");
    }
}
