//! Scalar encoding for trace documents
//!
//! Produces the textual form of every scalar the writer accepts:
//! - strings are escaped (quotes are added by the writer)
//! - doubles render like C `%g`, with wrappers for non-finite values
//! - sizes render as `N`, `NKb` or `NMb`

use std::borrow::Cow;
use std::fmt::Write as _;

/// Significant digits kept when rendering a double
const DOUBLE_PRECISION: usize = 6;

/// Sizes below this render in kilobytes, above it in megabytes
const SIZE_KB_LIMIT: i64 = 16 * 1024 * 1024;

/// Escape a string for inclusion between JSON quotes.
///
/// Borrows the input when nothing needs escaping, which is the common case
/// for identifiers and predicate text.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.chars().any(needs_escape) {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(result, "\\u{:04x}", c as u32);
            }
            c => result.push(c),
        }
    }
    Cow::Owned(result)
}

fn needs_escape(c: char) -> bool {
    c == '"' || c == '\\' || c.is_control()
}

/// Render a double the way `%g` does.
///
/// Non-finite values have no JSON number form and render as `NaN`, `+Inf`
/// or `-Inf`; the writer emits those quoted.
pub fn format_double(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f == f64::INFINITY {
        return "+Inf".to_string();
    }
    if f == f64::NEG_INFINITY {
        return "-Inf".to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to the target precision decides the exponent, exactly as %g does
    let sci = format!("{:.*e}", DOUBLE_PRECISION - 1, f);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= DOUBLE_PRECISION as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (DOUBLE_PRECISION as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, f)).to_string()
    }
}

/// Strip trailing zeros (and a dangling point) from a fixed-point rendering
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Render a byte count, switching to `Kb`/`Mb` suffixes for large values
pub fn format_size(bytes: i64) -> String {
    if bytes < 1024 {
        bytes.to_string()
    } else if bytes < SIZE_KB_LIMIT {
        format!("{}Kb", bytes / 1024)
    } else {
        format!("{}Mb", bytes / (1024 * 1024))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Strings ===

    #[test]
    fn test_escape_plain_borrows() {
        assert!(matches!(escape("t1.a = t2.b"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_quotes_and_backslash() {
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape("a\n\t\rb"), r"a\n\t\rb");
        assert_eq!(escape("\u{1}"), r"\u0001");
    }

    #[test]
    fn test_escape_leaves_unicode() {
        assert!(matches!(escape("日本語"), Cow::Borrowed("日本語")));
    }

    // === Doubles ===

    #[test]
    fn test_format_double_fixed() {
        assert_eq!(format_double(2.5), "2.5");
        assert_eq!(format_double(100.0), "100");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(-0.25), "-0.25");
    }

    #[test]
    fn test_format_double_rounds_to_six_digits() {
        assert_eq!(format_double(123456.7), "123457");
        assert_eq!(format_double(3.14159265), "3.14159");
    }

    #[test]
    fn test_format_double_exponent_form() {
        assert_eq!(format_double(1e6), "1e+06");
        assert_eq!(format_double(1.5e-5), "1.5e-05");
        assert_eq!(format_double(2.0e100), "2e+100");
        // Rounding up crosses into exponent form
        assert_eq!(format_double(999999.5), "1e+06");
    }

    #[test]
    fn test_format_double_zero() {
        assert_eq!(format_double(0.0), "0");
        assert_eq!(format_double(-0.0), "-0");
    }

    #[test]
    fn test_format_double_non_finite() {
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::INFINITY), "+Inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Inf");
    }

    // === Sizes ===

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2048), "2Kb");
        assert_eq!(format_size(32 * 1024 * 1024), "32Mb");
    }
}
