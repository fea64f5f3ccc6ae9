//! Percentage and ratio math shared by every report.
//!
//! All percentages are in `[0, 100]`, rounded to one decimal, and exactly `0`
//! when the denominator is zero.

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Forces a computed percentage into the displayable domain. NaN maps to 0.
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let raw = numerator as f64 / denominator as f64 * 100.0;
    round_to(clamp_percentage(raw), 1)
}

/// Channel quality: the mean of contact and conversion rates, taken from the
/// raw counts so the two roundings don't compound.
pub fn quality_score(contacted: u64, enrolled: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (contacted + enrolled) as f64 / total as f64 * 100.0 / 2.0;
    round_to(clamp_percentage(raw), 1)
}

/// Mean of two already-reported percentages.
pub fn mean_rate(first: f64, second: f64) -> f64 {
    round_to(clamp_percentage((first + second) / 2.0), 1)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Plain quotient rounded to one decimal, e.g. interactions per prospect.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    round_to(numerator / denominator, 1)
}

/// Signed period-over-period change in percent. Not clamped.
pub fn percent_change(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    round_to(
        (current as f64 - previous as f64) / previous as f64 * 100.0,
        1,
    )
}
