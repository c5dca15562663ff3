//! Number literal scanning.
//!
//! Accepted forms: decimal with optional fraction and `e` exponent, `0x`
//! hexadecimal, and `NrDIGITS` for any radix N in 2..=36 (with an optional
//! `&` exponent in that radix). `_` may separate digits anywhere after the
//! first. A leading `+` or `-` applies to every form.

/// Scans `src` as a number, or `None` when it is not one.
pub fn scan_number(src: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(src).ok()?;
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if rest.is_empty() || rest.starts_with('_') {
        return None;
    }
    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        scan_radix(hex, 16)?
    } else if let Some((radix, digits)) = split_radix(rest) {
        scan_radix(digits, radix)?
    } else {
        scan_decimal(rest)?
    };
    Some(if negative { -value } else { value })
}

/// Splits `NNrDIGITS`, where the prefix is one or two decimal digits.
fn split_radix(text: &str) -> Option<(u32, &str)> {
    let pos = text.find(['r', 'R'])?;
    let prefix = &text[..pos];
    if prefix.is_empty() || prefix.len() > 2 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let radix: u32 = prefix.parse().ok()?;
    Some((radix, &text[pos + 1..]))
}

fn scan_decimal(text: &str) -> Option<f64> {
    let first = text.as_bytes()[0];
    if !(first.is_ascii_digit() || first == b'.') {
        return None;
    }
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if !cleaned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn scan_radix(text: &str, radix: u32) -> Option<f64> {
    if !(2..=36).contains(&radix) || text.is_empty() || text.starts_with('_') {
        return None;
    }
    let (mantissa, exponent) = match text.split_once('&') {
        Some((m, e)) => (m, Some(e)),
        None => (text, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let base = radix as f64;
    let mut value = 0.0f64;
    let mut digits = 0usize;
    for c in int_part.chars().filter(|c| *c != '_') {
        value = value * base + c.to_digit(radix)? as f64;
        digits += 1;
    }
    let mut scale = 1.0 / base;
    for c in frac_part.chars().filter(|c| *c != '_') {
        value += c.to_digit(radix)? as f64 * scale;
        scale /= base;
        digits += 1;
    }
    if digits == 0 {
        return None;
    }
    if let Some(exp) = exponent {
        let (neg, exp) = match exp.strip_prefix('-') {
            Some(e) => (true, e),
            None => (false, exp.strip_prefix('+').unwrap_or(exp)),
        };
        let e = i32::from_str_radix(exp, radix).ok()?;
        value *= base.powi(if neg { -e } else { e });
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(s: &str) -> Option<f64> {
        scan_number(s.as_bytes())
    }

    #[test]
    fn test_decimal_forms() {
        assert_eq!(scan("42"), Some(42.0));
        assert_eq!(scan("-1.5"), Some(-1.5));
        assert_eq!(scan("1_000"), Some(1000.0));
        assert_eq!(scan("1e3"), Some(1000.0));
        assert_eq!(scan(".5"), Some(0.5));
    }

    #[test]
    fn test_radix_forms() {
        assert_eq!(scan("0xff"), Some(255.0));
        assert_eq!(scan("-0x10"), Some(-16.0));
        assert_eq!(scan("16rFF"), Some(255.0));
        assert_eq!(scan("2r1010"), Some(10.0));
        assert_eq!(scan("36rZ"), Some(35.0));
        assert_eq!(scan("2r1&11"), Some(8.0));
    }

    #[test]
    fn test_rejects_non_numbers() {
        for s in ["", "-", "abc", "inf", "nan", "0x", "37r1", "2r102", "1.2.3", "_1", "1e"] {
            assert_eq!(scan(s), None, "{s:?} should not scan");
        }
    }
}
