//! Derived figures for a time frame.
//!
//! Figures that depend on the frame's entries are only meaningful when the
//! entries were loaded with the frame; otherwise they are reported as `None`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::entities::{PreferenceRecord, TimeFrameRecord};

/// Rate used to price billable time, in minor currency units per hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRate {
    pub hourly_rate: i64,
    pub currency: String,
}

impl BillingRate {
    /// The frame's own rate wins; the global preference fills the gap.
    pub fn resolve(frame: &TimeFrameRecord, preference: Option<&PreferenceRecord>) -> Option<Self> {
        match (frame.hourly_rate, frame.currency.as_ref()) {
            (Some(hourly_rate), Some(currency)) => Some(Self {
                hourly_rate,
                currency: currency.clone(),
            }),
            _ => preference.map(|preference| Self {
                hourly_rate: preference.hourly_rate,
                currency: preference.currency.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFrameMetrics {
    pub period_duration_in_days: i64,
    pub total_recorded_duration_in_minutes: Option<i64>,
    pub entries_count: Option<usize>,
    pub average_daily_duration_in_minutes: Option<f64>,
    pub total_billable: Option<String>,
    pub days_tracked: Option<usize>,
}

impl TimeFrameMetrics {
    pub fn compute(frame: &TimeFrameRecord, rate: Option<&BillingRate>) -> Self {
        let period_duration_in_days = (frame.end_date - frame.start_date).whole_days().abs();
        let entries = frame.time_entries.as_deref();

        let finished_minutes: Option<Vec<i64>> = entries.map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.duration_seconds())
                .map(|seconds| seconds / 60)
                .collect()
        });

        let total_recorded_duration_in_minutes =
            finished_minutes.as_ref().map(|minutes| minutes.iter().sum());
        let average_daily_duration_in_minutes = finished_minutes.as_ref().and_then(|minutes| {
            (!minutes.is_empty())
                .then(|| minutes.iter().sum::<i64>() as f64 / minutes.len() as f64)
        });
        let entries_count = entries.map(<[_]>::len);
        let days_tracked = entries.map(|entries| {
            entries
                .iter()
                .map(|entry| entry.work_day)
                .collect::<HashSet<_>>()
                .len()
        });

        let billable_seconds = frame.total_billable_seconds.or_else(|| {
            entries.map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.billable)
                    .filter_map(|entry| entry.duration_seconds())
                    .sum::<i64>() as f64
            })
        });
        let total_billable = rate.map(|rate| {
            let hours = billable_seconds.unwrap_or(0.0) / 3600.0;
            let amount = hours * rate.hourly_rate as f64 / 100.0;
            format!("{} {}", rate.currency, format_amount(amount))
        });

        Self {
            period_duration_in_days,
            total_recorded_duration_in_minutes,
            entries_count,
            average_daily_duration_in_minutes,
            total_billable,
            days_tracked,
        }
    }
}

/// Two decimals with `,` thousands separators, e.g. `1,234.50`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped}.{fraction:02}")
}
