//! Shared domain enumerations aligned with persisted database values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Entity types that participate in filtering and caching.
///
/// The string forms double as cache tag labels, so they must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Project,
    TimeFrame,
    TimeEntry,
    Preference,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Project,
        EntityType::TimeFrame,
        EntityType::TimeEntry,
        EntityType::Preference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Project => "Project",
            EntityType::TimeFrame => "TimeFrame",
            EntityType::TimeEntry => "TimeEntry",
            EntityType::Preference => "Preference",
        }
    }

    /// Plural tag. Always the singular label plus `s`, so `TimeEntrys` is intentional.
    pub fn plural(self) -> &'static str {
        match self {
            EntityType::Project => "Projects",
            EntityType::TimeFrame => "TimeFrames",
            EntityType::TimeEntry => "TimeEntrys",
            EntityType::Preference => "Preferences",
        }
    }

    /// Resource `type` member used in API payloads.
    pub fn resource_type(self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::TimeFrame => "timeFrame",
            EntityType::TimeEntry => "timeEntry",
            EntityType::Preference => "preference",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeFrameStatus {
    Done,
    #[default]
    InProgress,
    Canceled,
}

impl TimeFrameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeFrameStatus::Done => "done",
            TimeFrameStatus::InProgress => "in_progress",
            TimeFrameStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for TimeFrameStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "done" => Ok(TimeFrameStatus::Done),
            "in_progress" => Ok(TimeFrameStatus::InProgress),
            "canceled" => Ok(TimeFrameStatus::Canceled),
            other => Err(DomainError::validation(format!(
                "unknown time frame status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekStart {
    pub fn as_str(self) -> &'static str {
        match self {
            WeekStart::Monday => "monday",
            WeekStart::Tuesday => "tuesday",
            WeekStart::Wednesday => "wednesday",
            WeekStart::Thursday => "thursday",
            WeekStart::Friday => "friday",
            WeekStart::Saturday => "saturday",
            WeekStart::Sunday => "sunday",
        }
    }
}

impl FromStr for WeekStart {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "monday" => Ok(WeekStart::Monday),
            "tuesday" => Ok(WeekStart::Tuesday),
            "wednesday" => Ok(WeekStart::Wednesday),
            "thursday" => Ok(WeekStart::Thursday),
            "friday" => Ok(WeekStart::Friday),
            "saturday" => Ok(WeekStart::Saturday),
            "sunday" => Ok(WeekStart::Sunday),
            other => Err(DomainError::validation(format!(
                "unknown week start `{other}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_tag_labels_are_stable() {
        assert_eq!(EntityType::TimeFrame.as_str(), "TimeFrame");
        assert_eq!(EntityType::TimeEntry.plural(), "TimeEntrys");
        assert_eq!(EntityType::Project.resource_type(), "project");
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TimeFrameStatus::Done,
            TimeFrameStatus::InProgress,
            TimeFrameStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<TimeFrameStatus>().unwrap(), status);
        }
        assert!("archived".parse::<TimeFrameStatus>().is_err());
    }

    #[test]
    fn week_start_is_case_insensitive() {
        assert_eq!("Sunday".parse::<WeekStart>().unwrap(), WeekStart::Sunday);
    }
}
