//! Per-entity filter declarations, built once per process.

use once_cell::sync::Lazy;

use super::operation::{ComputedField, Relation};
use super::{FilterSpec, Method};
use crate::domain::types::EntityType;

const PROJECT_SORTABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("slug", "slug"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const TIME_FRAME_SORTABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("projectId", "project_id"),
    ("startDate", "start_date"),
    ("endDate", "end_date"),
    ("name", "name"),
    ("status", "status"),
    ("notes", "notes"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const TIME_ENTRY_SORTABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("timeFrameId", "time_frame_id"),
    ("workDay", "work_day"),
    ("startTime", "start_time"),
    ("endTime", "end_time"),
    ("description", "description"),
    ("billable", "billable"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const PREFERENCE_SORTABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const TIME_FRAMES: &[EntityType] = &[EntityType::TimeFrame];
const TIME_ENTRIES: &[EntityType] = &[EntityType::TimeEntry];
const TIME_ENTRIES_THROUGH_FRAMES: &[EntityType] = &[EntityType::TimeFrame, EntityType::TimeEntry];
const PROJECTS: &[EntityType] = &[EntityType::Project];

static PROJECT: Lazy<FilterSpec> = Lazy::new(project);
static TIME_FRAME: Lazy<FilterSpec> = Lazy::new(time_frame);
static TIME_ENTRY: Lazy<FilterSpec> = Lazy::new(time_entry);
static PREFERENCE: Lazy<FilterSpec> = Lazy::new(preference);

/// The process-wide declaration for `entity`.
pub fn spec_for(entity: EntityType) -> &'static FilterSpec {
    match entity {
        EntityType::Project => &PROJECT,
        EntityType::TimeFrame => &TIME_FRAME,
        EntityType::TimeEntry => &TIME_ENTRY,
        EntityType::Preference => &PREFERENCE,
    }
}

fn project() -> FilterSpec {
    FilterSpec::new(
        EntityType::Project,
        PROJECT_SORTABLE,
        [
            ("id", Method::Identifier("id")),
            ("name", Method::Text("name")),
            ("slug", Method::Enum("slug")),
            ("description", Method::Text("description")),
            (
                "timeFramesCount",
                Method::Computed(ComputedField::TimeFramesCount),
            ),
            (
                "timeEntriesCount",
                Method::Computed(ComputedField::TimeEntriesCount),
            ),
        ],
        &[
            ("timeFrames", TIME_FRAMES),
            ("timeEntries", TIME_ENTRIES_THROUGH_FRAMES),
        ],
    )
}

fn time_frame() -> FilterSpec {
    FilterSpec::new(
        EntityType::TimeFrame,
        TIME_FRAME_SORTABLE,
        [
            ("id", Method::Identifier("id")),
            ("projectId", Method::Identifier("project_id")),
            ("startDate", Method::Date("start_date")),
            ("endDate", Method::Date("end_date")),
            ("name", Method::Text("name")),
            ("status", Method::Enum("status")),
            ("notes", Method::Text("notes")),
            ("hourlyRate", Method::Money("hourly_rate")),
            (
                "totalBillableSeconds",
                Method::Computed(ComputedField::TotalBillableSeconds),
            ),
            ("project", Method::Related(Relation::Project)),
        ],
        &[
            ("timeEntries", TIME_ENTRIES),
            ("project", PROJECTS),
        ],
    )
}

fn time_entry() -> FilterSpec {
    FilterSpec::new(
        EntityType::TimeEntry,
        TIME_ENTRY_SORTABLE,
        [
            ("id", Method::Identifier("id")),
            ("timeFrameId", Method::Identifier("time_frame_id")),
            ("workDay", Method::Date("work_day")),
            ("startTime", Method::Time("start_time")),
            ("endTime", Method::Time("end_time")),
            ("description", Method::Text("description")),
            ("billable", Method::Boolean("billable")),
            ("timeFrame", Method::Related(Relation::TimeFrame)),
        ],
        &[("timeFrame", TIME_FRAMES)],
    )
}

fn preference() -> FilterSpec {
    FilterSpec::new(
        EntityType::Preference,
        PREFERENCE_SORTABLE,
        [("id", Method::Identifier("id"))],
        &[],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_has_a_spec() {
        for entity in EntityType::ALL {
            assert_eq!(spec_for(entity).entity, entity);
        }
    }

    #[test]
    fn relation_methods_point_at_registered_specs() {
        for entity in EntityType::ALL {
            for method in spec_for(entity).methods() {
                if let Method::Related(relation) = method {
                    assert!(!spec_for(relation.entity()).sortable.is_empty());
                }
            }
        }
    }
}
