//! Domain entities mirrored from persistent storage.
//!
//! Records carry optional relation and aggregate slots. A slot is `None` when
//! the query did not ask for it, which is how the resource layer tells
//! "not loaded" apart from "loaded and empty".

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::types::{TimeFrameStatus, WeekStart};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub additional_properties: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub time_frames_count: Option<i64>,
    #[serde(default)]
    pub time_entries_count: Option<i64>,
    #[serde(default)]
    pub time_frames: Option<Vec<TimeFrameRecord>>,
    #[serde(default)]
    pub time_entries: Option<Vec<TimeEntryRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFrameRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub name: Option<String>,
    pub status: TimeFrameStatus,
    pub notes: Option<String>,
    /// Hourly rate in minor currency units.
    pub hourly_rate: Option<i64>,
    pub currency: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub total_billable_seconds: Option<f64>,
    #[serde(default)]
    pub time_entries_count: Option<i64>,
    #[serde(default)]
    pub time_entries: Option<Vec<TimeEntryRecord>>,
    #[serde(default)]
    pub project: Option<Box<ProjectRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryRecord {
    pub id: Uuid,
    pub time_frame_id: Uuid,
    pub work_day: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub billable: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub time_frame: Option<Box<TimeFrameRecord>>,
}

impl TimeEntryRecord {
    /// Duration in whole seconds, `None` while the entry is still running.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).whole_seconds().abs())
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub id: Uuid,
    /// Hourly rate in minor currency units.
    pub hourly_rate: i64,
    pub currency: String,
    pub week_start: WeekStart,
    pub additional_properties: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PreferenceRecord {
    /// Hourly rate in major currency units.
    pub fn hourly_rate_major(&self) -> f64 {
        self.hourly_rate as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    fn entry(end: Option<OffsetDateTime>) -> TimeEntryRecord {
        TimeEntryRecord {
            id: Uuid::nil(),
            time_frame_id: Uuid::nil(),
            work_day: date!(2024 - 01 - 02),
            start_time: datetime!(2024-01-02 09:00 UTC),
            end_time: end,
            description: None,
            billable: true,
            created_at: datetime!(2024-01-02 09:00 UTC),
            updated_at: datetime!(2024-01-02 09:00 UTC),
            time_frame: None,
        }
    }

    #[test]
    fn running_entry_has_no_duration() {
        assert_eq!(entry(None).duration_seconds(), None);
        assert!(!entry(None).is_finalized());
    }

    #[test]
    fn finished_entry_reports_seconds() {
        let finished = entry(Some(datetime!(2024-01-02 10:30 UTC)));
        assert_eq!(finished.duration_seconds(), Some(5400));
    }

    #[test]
    fn records_survive_json_round_trip() {
        let original = entry(Some(datetime!(2024-01-02 10:30 UTC)));
        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded: TimeEntryRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, original);
    }
}
