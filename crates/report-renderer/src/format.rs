//! Numeric formatting shared by every section of the report.
//!
//! The literal output of these functions is read by downstream consumers, so
//! changes here are format changes.

pub const NOT_AVAILABLE: &str = "N/A";

pub fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" => Some("$"),
        "CNY" => Some("¥"),
        _ => None,
    }
}

/// Groups the integer digits of an already formatted, unsigned decimal.
fn group_thousands(formatted: &str) -> String {
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}

/// `$2,050.30`, `¥2,877.30`, `-$12.00`. Unknown currencies are suffixed with their code.
pub fn format_price(value: Option<f64>, currency: &str) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };

    let cents = format!("{:.2}", value.abs());
    let sign = if value < 0.0 && !rounds_to_zero(&cents) { "-" } else { "" };
    let amount = group_thousands(&cents);
    match currency_symbol(currency) {
        Some(symbol) => format!("{}{}{}", sign, symbol, amount),
        None => format!("{}{} {}", sign, amount, currency),
    }
}

/// Always signed, two decimals: `+0.45%`, `-1.20%`.
pub fn format_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) if rounds_to_zero(&format!("{:.2}", v.abs())) => "+0.00%".to_string(),
        Some(v) => format!("{:+.2}%", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_number(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => group_thousands_signed(v),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn group_thousands_signed(value: f64) -> String {
    let cents = format!("{:.2}", value.abs());
    let sign = if value < 0.0 && !rounds_to_zero(&cents) { "-" } else { "" };
    format!("{}{}", sign, group_thousands(&cents))
}

// Keeps tiny negatives from printing as "-0.00".
fn rounds_to_zero(cents: &str) -> bool {
    cents == "0.00"
}

/// Inverse of [`format_price`]; `None` for `N/A` or anything unparsable.
pub fn parse_price(text: &str) -> Option<f64> {
    let text = text.trim();
    if text == NOT_AVAILABLE {
        return None;
    }
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Inverse of [`format_percent`].
pub fn parse_percent(text: &str) -> Option<f64> {
    let text = text.trim();
    let number = text.strip_suffix('%')?;
    number.trim_start_matches('+').parse().ok()
}
