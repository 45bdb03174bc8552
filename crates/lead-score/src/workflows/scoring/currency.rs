//! Brazilian real (BRL) text conversions used by the calculator and admin forms.
//!
//! Parsing is a lenient heuristic tuned for `pt-BR` input: dots are always
//! thousands separators and a comma, when present, is the decimal point.

const SYMBOL: &str = "R$";
const NBSP: char = '\u{a0}';

/// Parse user-entered currency text. Never fails: unreadable input is `0.0`.
///
/// `"R$ 1.234,56"` is `1234.56`, while `"1.234"` (no comma) is `1234.0`.
pub fn parse_brl(text: &str) -> f64 {
    let stripped = strip_symbol(text);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replacen(',', ".", 1)
    } else {
        trimmed.replace('.', "")
    };

    leading_number(&normalized)
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Render a value as `R$ 1.234,56`, rounded half away from zero to cents.
///
/// The separator after the symbol is a non-breaking space. Non-finite values
/// render as zero.
pub fn format_brl(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u128;
    let negative = value < 0.0 && cents > 0;

    let units = group_thousands(cents / 100);
    let fraction = cents % 100;
    let sign = if negative { "-" } else { "" };

    format!("{sign}{SYMBOL}{NBSP}{units},{fraction:02}")
}

fn strip_symbol(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if (ch == 'R' || ch == 'r') && chars.peek() == Some(&'$') {
            chars.next();
            if chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            continue;
        }
        out.push(ch);
    }

    out
}

/// Longest decimal prefix, mirroring how browsers read `parseFloat` input.
fn leading_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok()
}

fn group_thousands(mut units: u128) -> String {
    if units == 0 {
        return "0".to_string();
    }

    let mut groups = Vec::new();
    while units > 0 {
        groups.push(units % 1000);
        units /= 1000;
    }

    let mut out = String::new();
    for (index, group) in groups.iter().rev().enumerate() {
        if index == 0 {
            out.push_str(&group.to_string());
        } else {
            out.push('.');
            out.push_str(&format!("{group:03}"));
        }
    }
    out
}
