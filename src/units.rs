/// NEAR <-> yoctoNEAR conversions
use crate::error::{Result, WalletError};

/// Exponent of the NEAR nomination: 1 NEAR = 10^24 yoctoNEAR
pub const NEAR_NOMINATION_EXP: usize = 24;
pub const YOCTO_PER_NEAR: u128 = 1_000_000_000_000_000_000_000_000;

/// Convert a human readable NEAR amount (e.g. "1.5" or "1,000") to yoctoNEAR
pub fn parse_near_amount(amount: &str) -> Result<u128> {
    let cleaned: String = amount.trim().chars().filter(|c| *c != ',').collect();
    let invalid = || WalletError::InvalidAmount(format!("Cannot parse '{}' as NEAR amount", amount));

    let mut parts = cleaned.split('.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() || fraction.len() > NEAR_NOMINATION_EXP {
        return Err(invalid());
    }
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    format!("{}{:0<width$}", whole, fraction, width = NEAR_NOMINATION_EXP)
        .parse::<u128>()
        .map_err(|_| invalid())
}

/// Convert yoctoNEAR to a NEAR string with at most `frac_digits` fractional
/// digits, rounding half-up and grouping the whole part with commas
pub fn format_near_amount(yocto: u128, frac_digits: usize) -> String {
    format_units(yocto, frac_digits, true)
}

/// NEAR value of a yoctoNEAR amount, as used for balance display
pub fn yocto_to_near(yocto: u128) -> f64 {
    format_units(yocto, NEAR_NOMINATION_EXP, false)
        .parse::<f64>()
        .unwrap_or(0.0)
}

fn format_units(yocto: u128, frac_digits: usize, group: bool) -> String {
    let frac_digits = frac_digits.min(NEAR_NOMINATION_EXP);

    let mut value = yocto;
    if frac_digits < NEAR_NOMINATION_EXP {
        let rounding_exp = (NEAR_NOMINATION_EXP - frac_digits - 1) as u32;
        value = value.saturating_add(5 * 10u128.pow(rounding_exp));
    }

    let digits = value.to_string();
    let (whole, fraction) = if digits.len() > NEAR_NOMINATION_EXP {
        digits.split_at(digits.len() - NEAR_NOMINATION_EXP)
    } else {
        ("0", digits.as_str())
    };
    let fraction = format!("{:0>width$}", fraction, width = NEAR_NOMINATION_EXP);

    let whole = if group { with_commas(whole) } else { whole.to_string() };
    let formatted = format!("{}.{}", whole, &fraction[..frac_digits]);

    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn with_commas(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_near_amount() {
        assert_eq!(parse_near_amount("1").unwrap(), YOCTO_PER_NEAR);
        assert_eq!(parse_near_amount("1.5").unwrap(), 1_500_000_000_000_000_000_000_000);
        assert_eq!(parse_near_amount(" 1,000 ").unwrap(), 1000 * YOCTO_PER_NEAR);
        assert_eq!(parse_near_amount(".25").unwrap(), 250_000_000_000_000_000_000_000);
        assert_eq!(parse_near_amount("0.000000000000000000000001").unwrap(), 1);
        assert_eq!(
            parse_near_amount("0.103826755259393477016974").unwrap(),
            103_826_755_259_393_477_016_974
        );
    }

    #[test]
    fn test_parse_near_amount_rejects_garbage() {
        assert!(parse_near_amount("").is_err());
        assert!(parse_near_amount(".").is_err());
        assert!(parse_near_amount("1.2.3").is_err());
        assert!(parse_near_amount("abc").is_err());
        assert!(parse_near_amount("-1").is_err());
        // 25 fractional digits
        assert!(parse_near_amount("0.0000000000000000000000001").is_err());
    }

    #[test]
    fn test_format_near_amount() {
        assert_eq!(format_near_amount(YOCTO_PER_NEAR, 24), "1");
        assert_eq!(format_near_amount(1_500_000_000_000_000_000_000_000, 24), "1.5");
        assert_eq!(format_near_amount(1234 * YOCTO_PER_NEAR, 24), "1,234");
        assert_eq!(format_near_amount(0, 24), "0");
        assert_eq!(format_near_amount(1, 24), "0.000000000000000000000001");
        // rounds half-up at the requested precision
        assert_eq!(format_near_amount(1_255_000_000_000_000_000_000_000, 2), "1.26");
        assert_eq!(format_near_amount(1_254_000_000_000_000_000_000_000, 2), "1.25");
    }

    #[test]
    fn test_yocto_to_near() {
        assert_eq!(yocto_to_near(0), 0.0);
        assert_eq!(yocto_to_near(2_500_000_000_000_000_000_000_000), 2.5);
        assert_eq!(yocto_to_near(1_000_000 * YOCTO_PER_NEAR), 1_000_000.0);
    }
}
