//! Conversions between the major-unit amounts clients send and the minor units stored.

/// Smallest amount the payment provider accepts for a charge, in minor units (2.00).
pub const MIN_CHARGE_MINOR: i64 = 200;

/// Converts a major-unit amount (e.g. `12.5`) to minor units (`1250`).
///
/// Returns `None` for negative, non-finite, or out-of-range input.
pub fn to_minor_units(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }

    let minor = (amount * 100.0).round();
    if minor > i64::MAX as f64 {
        return None;
    }

    Some(minor as i64)
}

pub fn to_major_units(amount_minor: i64) -> f64 {
    amount_minor as f64 / 100.0
}

/// Clamps an amount below the provider minimum up to the minimum.
pub fn apply_provider_floor(amount_minor: i64) -> i64 {
    amount_minor.max(MIN_CHARGE_MINOR)
}

/// Pre-authorization for a recurring rate: one rate per month of the booking.
pub fn pre_authorization_amount(monthly_rate: f64, duration_months: i32) -> f64 {
    monthly_rate * f64::from(duration_months)
}

/// Renders minor units as a display string, e.g. `1500.00`.
pub fn format_minor(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
