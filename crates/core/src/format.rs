//! Display formatting for prices, percentages and market caps.

use num_format::{Locale, ToFormattedString};

/// Fixed two-decimal rendering with thousands separators ("1,234,567.89").
fn with_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let grouped = int_part
        .parse::<u64>()
        .map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Format price with precision based on magnitude.
/// Large prices get separators and cents, small ones six decimals.
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "N/A".to_string();
    }
    if price.abs() >= 1000.0 {
        format!("${}", with_thousands(price))
    } else {
        format!("${:.6}", price)
    }
}

/// Format a 24h change as "📈 +1.23%" / "📉 -1.23%".
pub fn format_percentage(change: Option<f64>) -> String {
    match change {
        Some(pct) if pct.is_finite() => {
            let (emoji, sign) = if pct >= 0.0 { ("📈", "+") } else { ("📉", "") };
            format!("{} {}{:.2}%", emoji, sign, pct)
        }
        _ => "N/A".to_string(),
    }
}

/// Format a market cap or USD volume scaled to T/B/M.
pub fn format_market_cap(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => {
            if v >= 1e12 {
                format!("${:.2}T", v / 1e12)
            } else if v >= 1e9 {
                format!("${:.2}B", v / 1e9)
            } else if v >= 1e6 {
                format!("${:.2}M", v / 1e6)
            } else {
                format_price(v)
            }
        }
        _ => "N/A".to_string(),
    }
}
