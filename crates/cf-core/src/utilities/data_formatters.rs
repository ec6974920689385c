//! Number formatting helpers used by fit reports.

use crate::Real;

/// Format a value in general notation with `digits` significant digits.
///
/// Very large or very small magnitudes switch to scientific notation so that
/// columns in a report stay narrow. Non-finite values print as `nan`, `inf`
/// or `-inf`.
pub fn format_general(value: Real, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= digits as i32 {
        format!("{:.prec$e}", value, prec = digits - 1)
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        let s = format!("{:.prec$}", value, prec = decimals);
        trim_trailing_zeros(&s)
    }
}

/// Format `value ± std_dev`, e.g. `1.2346 +/- 0.0012`.
pub fn format_with_uncertainty(value: Real, std_dev: Real, digits: usize) -> String {
    format!(
        "{} +/- {}",
        format_general(value, digits),
        format_general(std_dev, digits)
    )
}

/// Relative uncertainty `|std_dev / value|` as a percentage string, or
/// `None` when it is not meaningful (zero or non-finite).
pub fn format_relative_uncertainty(value: Real, std_dev: Real) -> Option<String> {
    if value == 0.0 || !value.is_finite() || !std_dev.is_finite() {
        return None;
    }
    Some(format!("{:.2}%", (std_dev / value).abs() * 100.0))
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    trimmed.trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_general() {
        assert_eq!(format_general(1.234567, 4), "1.235");
        assert_eq!(format_general(120.0, 4), "120");
        assert_eq!(format_general(0.0, 4), "0");
        assert_eq!(format_general(1.5e-7, 3), "1.50e-7");
        assert_eq!(format_general(f64::NAN, 3), "nan");
        assert_eq!(format_general(f64::NEG_INFINITY, 3), "-inf");
    }

    #[test]
    fn test_format_with_uncertainty() {
        assert_eq!(format_with_uncertainty(2.5, 0.125, 3), "2.5 +/- 0.125");
        assert_eq!(format_with_uncertainty(2.5, f64::NAN, 3), "2.5 +/- nan");
    }

    #[test]
    fn test_relative_uncertainty() {
        assert_eq!(format_relative_uncertainty(2.0, 0.1).as_deref(), Some("5.00%"));
        assert!(format_relative_uncertainty(0.0, 0.1).is_none());
        assert!(format_relative_uncertainty(1.0, f64::NAN).is_none());
    }

    proptest::proptest! {
        #[test]
        fn general_format_keeps_requested_precision(value in -1e12f64..1e12, digits in 3usize..10) {
            let text = format_general(value, digits);
            let parsed: f64 = text.parse().unwrap();
            let tolerance = value.abs() * 10f64.powi(1 - digits as i32) + 1e-300;
            proptest::prop_assert!((parsed - value).abs() <= tolerance, "{value} -> {text}");
        }
    }
}
