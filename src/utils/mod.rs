//! Utility functions for formatting
//!
//! Centralized formatting so money and rates look the same in tables,
//! the interactive menu and command output.

/// Formats a dollar amount with thousands separators and two decimals,
/// right-aligned to `width` (0 for no padding).
///
/// # Examples
/// ```
/// use stock_manager::utils::format_currency_with_width;
///
/// assert_eq!(format_currency_with_width(1234.5, 0), "$1,234.50");
/// assert_eq!(format_currency_with_width(-99.999, 0), "-$100.00");
/// assert_eq!(format_currency_with_width(5.0, 8), "   $5.00");
/// ```
pub fn format_currency_with_width(value: f64, width: usize) -> String {
    let is_negative = value < 0.0;
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut with_separators = String::with_capacity(integer_part.len() + integer_part.len() / 3);
    for (i, c) in integer_part.chars().enumerate() {
        if i > 0 && (integer_part.len() - i) % 3 == 0 {
            with_separators.push(',');
        }
        with_separators.push(c);
    }

    let sign = if is_negative && formatted != "0.00" { "-" } else { "" };
    let result = format!("{}${}.{}", sign, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format as dollars: "$1,234.56"
///
/// # Examples
/// ```
/// use stock_manager::utils::format_currency;
///
/// assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
/// ```
pub fn format_currency(value: f64) -> String {
    format_currency_with_width(value, 0)
}

/// Format a fractional rate as a percentage: 0.1234 -> "12.34%"
///
/// # Examples
/// ```
/// use stock_manager::utils::format_percent;
///
/// assert_eq!(format_percent(0.1), "10.00%");
/// assert_eq!(format_percent(-0.0525), "-5.25%");
/// ```
pub fn format_percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}
