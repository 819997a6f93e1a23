//! JSON resource rendering.
//!
//! Every record renders as `{id, type, attributes, links, relationships, includes}`.
//! Relations appear under `includes` only when the query loaded them, and an
//! include restricted to columns (`project:id;name`) keeps only those attributes.
//! Time frame figures come from the derived cache region.

use serde_json::{Map, Value, json};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use url::form_urlencoded;
use uuid::Uuid;

use super::state::ApiState;
use crate::application::error::ServiceError;
use crate::application::filter::{PAGE_KEY, ParamValue, QueryParams, TranslatedQuery, spec_for};
use crate::application::pagination::Paginated;
use crate::domain::entities::{PreferenceRecord, ProjectRecord, TimeEntryRecord, TimeFrameRecord};
use crate::domain::types::EntityType;

pub const API_PREFIX: &str = "/api/v1";

pub fn collection_path(entity: EntityType) -> String {
    let segment = match entity {
        EntityType::Project => "projects",
        EntityType::TimeFrame => "time-frames",
        EntityType::TimeEntry => "time-entries",
        EntityType::Preference => "preferences",
    };
    format!("{API_PREFIX}/{segment}")
}

fn self_link(entity: EntityType, id: Uuid) -> String {
    match entity {
        EntityType::Preference => collection_path(entity),
        _ => format!("{}/{id}", collection_path(entity)),
    }
}

fn timestamp(value: OffsetDateTime) -> Value {
    value
        .format(&Rfc3339)
        .map(Value::String)
        .unwrap_or(Value::Null)
}

fn date(value: Date) -> Value {
    Value::String(value.to_string())
}

fn major_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Attribute map honouring an include's column restriction.
struct Attributes<'f> {
    fields: &'f [String],
    map: Map<String, Value>,
}

impl<'f> Attributes<'f> {
    fn new(fields: &'f [String]) -> Self {
        Self {
            fields,
            map: Map::new(),
        }
    }

    fn unrestricted(&self) -> bool {
        self.fields.is_empty()
    }

    fn put(&mut self, column: &str, key: &str, value: impl Into<Value>) {
        if self.unrestricted() || self.fields.iter().any(|field| field == column) {
            self.map.insert(key.to_string(), value.into());
        }
    }

    /// Merge computed members; skipped when the include named its columns.
    fn merge(&mut self, members: Map<String, Value>) {
        if self.unrestricted() {
            self.map.extend(members);
        }
    }
}

fn relationship(entity: EntityType, id: Uuid) -> Value {
    json!({
        "data": { "type": entity.resource_type(), "id": id },
        "links": { "self": self_link(entity, id) },
    })
}

fn resource(
    entity: EntityType,
    id: Uuid,
    attributes: Attributes<'_>,
    relationships: Map<String, Value>,
    includes: Map<String, Value>,
) -> Value {
    json!({
        "id": id,
        "type": entity.resource_type(),
        "attributes": attributes.map,
        "links": { "self": self_link(entity, id) },
        "relationships": relationships,
        "includes": includes,
    })
}

pub struct Renderer<'a> {
    state: &'a ApiState,
    query: TranslatedQuery,
}

impl<'a> Renderer<'a> {
    pub fn new(state: &'a ApiState, entity: EntityType, params: &QueryParams) -> Self {
        Self {
            state,
            query: spec_for(entity).translate(params),
        }
    }

    fn fields(&self, relation: &str) -> &[String] {
        self.query
            .include(relation)
            .map(|directive| directive.fields.as_slice())
            .unwrap_or(&[])
    }

    pub async fn project(&self, project: &ProjectRecord) -> Result<Value, ServiceError> {
        let mut includes = Map::new();
        if let Some(frames) = &project.time_frames {
            let fields = self.fields("timeFrames");
            let mut rendered = Vec::with_capacity(frames.len());
            for frame in frames {
                rendered.push(self.time_frame_body(frame, fields, Map::new()).await?);
            }
            includes.insert("timeFrames".to_string(), Value::Array(rendered));
        }
        if let Some(entries) = &project.time_entries {
            let fields = self.fields("timeEntries");
            let rendered = entries
                .iter()
                .map(|entry| time_entry_body(entry, fields, Map::new()))
                .collect();
            includes.insert("timeEntries".to_string(), Value::Array(rendered));
        }
        Ok(project_body(project, &[], includes))
    }

    pub async fn time_frame(&self, frame: &TimeFrameRecord) -> Result<Value, ServiceError> {
        let mut includes = Map::new();
        if let Some(entries) = &frame.time_entries {
            let fields = self.fields("timeEntries");
            let rendered = entries
                .iter()
                .map(|entry| time_entry_body(entry, fields, Map::new()))
                .collect();
            includes.insert("timeEntries".to_string(), Value::Array(rendered));
        }
        if let Some(project) = &frame.project {
            includes.insert(
                "project".to_string(),
                project_body(project, self.fields("project"), Map::new()),
            );
        }

        self.time_frame_body(frame, &[], includes).await
    }

    pub async fn time_entry(&self, entry: &TimeEntryRecord) -> Result<Value, ServiceError> {
        let mut includes = Map::new();
        if let Some(frame) = &entry.time_frame {
            includes.insert(
                "timeFrame".to_string(),
                self.time_frame_body(frame, self.fields("timeFrame"), Map::new())
                    .await?,
            );
        }
        Ok(time_entry_body(entry, &[], includes))
    }

    pub fn preference(&self, preference: &PreferenceRecord) -> Value {
        let mut attributes = Attributes::new(&[]);
        attributes.put("hourly_rate", "hourlyRate", preference.hourly_rate_major());
        attributes.put("currency", "currency", preference.currency.as_str());
        attributes.put("week_start", "weekStart", preference.week_start.as_str());
        if let Value::Object(properties) = &preference.additional_properties {
            attributes.merge(properties.clone());
        }
        attributes.put("created_at", "createdAt", timestamp(preference.created_at));
        attributes.put("updated_at", "updatedAt", timestamp(preference.updated_at));

        resource(
            EntityType::Preference,
            preference.id,
            attributes,
            Map::new(),
            Map::new(),
        )
    }

    async fn time_frame_body(
        &self,
        frame: &TimeFrameRecord,
        fields: &[String],
        includes: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let mut attributes = Attributes::new(fields);
        self.time_frame_attributes(frame, &mut attributes).await?;
        let mut relationships = Map::new();
        relationships.insert(
            "project".to_string(),
            relationship(EntityType::Project, frame.project_id),
        );
        Ok(resource(
            EntityType::TimeFrame,
            frame.id,
            attributes,
            relationships,
            includes,
        ))
    }

    async fn time_frame_attributes(
        &self,
        frame: &TimeFrameRecord,
        attributes: &mut Attributes<'_>,
    ) -> Result<(), ServiceError> {
        attributes.put("start_date", "startDate", date(frame.start_date));
        attributes.put("end_date", "endDate", date(frame.end_date));
        attributes.put("name", "name", frame.name.clone());
        attributes.put("status", "status", frame.status.as_str());
        attributes.put("notes", "notes", frame.notes.clone());
        attributes.put("hourly_rate", "hourlyRate", frame.hourly_rate.map(major_units));
        attributes.put("currency", "currency", frame.currency.clone());
        attributes.put("created_at", "createdAt", timestamp(frame.created_at));
        attributes.put("updated_at", "updatedAt", timestamp(frame.updated_at));
        if let Some(seconds) = frame.total_billable_seconds {
            attributes.put("total_billable_seconds", "totalBillableSeconds", seconds);
        }

        if attributes.unrestricted() {
            let preferences = &self.state.preferences;
            let metrics = self
                .state
                .derived
                .time_frame_metrics(frame, || preferences.global())
                .await?;
            if let Ok(Value::Object(members)) = serde_json::to_value(&metrics) {
                attributes.merge(members);
            }
        }
        Ok(())
    }
}

fn project_body(project: &ProjectRecord, fields: &[String], includes: Map<String, Value>) -> Value {
    let mut attributes = Attributes::new(fields);
    attributes.put("name", "name", project.name.as_str());
    attributes.put("slug", "slug", project.slug.as_str());
    attributes.put("time_frames_count", "timeFramesCount", project.time_frames_count);
    attributes.put("time_entries_count", "timeEntriesCount", project.time_entries_count);
    attributes.put("description", "description", project.description.clone());
    attributes.put(
        "additional_properties",
        "additionalProperties",
        project.additional_properties.clone(),
    );
    attributes.put("created_at", "createdAt", timestamp(project.created_at));
    attributes.put("updated_at", "updatedAt", timestamp(project.updated_at));

    resource(EntityType::Project, project.id, attributes, Map::new(), includes)
}

fn time_entry_body(
    entry: &TimeEntryRecord,
    fields: &[String],
    includes: Map<String, Value>,
) -> Value {
    let mut attributes = Attributes::new(fields);
    attributes.put("work_day", "workDay", date(entry.work_day));
    attributes.put("start_time", "startTime", timestamp(entry.start_time));
    attributes.put(
        "end_time",
        "endTime",
        entry.end_time.map(timestamp).unwrap_or(Value::Null),
    );
    attributes.put("description", "description", entry.description.clone());
    attributes.put("billable", "billable", entry.billable);
    attributes.put("created_at", "createdAt", timestamp(entry.created_at));
    attributes.put("updated_at", "updatedAt", timestamp(entry.updated_at));

    let mut relationships = Map::new();
    relationships.insert(
        "timeFrame".to_string(),
        relationship(EntityType::TimeFrame, entry.time_frame_id),
    );
    resource(
        EntityType::TimeEntry,
        entry.id,
        attributes,
        relationships,
        includes,
    )
}

/// `{data, links, meta}` for one page of rendered resources.
pub fn collection<T>(
    entity: EntityType,
    page: &Paginated<T>,
    data: Vec<Value>,
    params: &QueryParams,
) -> Value {
    let path = collection_path(entity);
    let last_page = page.last_page();
    let link = |number: u32| Value::String(page_url(&path, params, number, page.per_page));

    json!({
        "data": data,
        "links": {
            "first": link(1),
            "last": link(last_page),
            "prev": if page.page > 1 { link(page.page - 1) } else { Value::Null },
            "next": if page.page < last_page { link(page.page + 1) } else { Value::Null },
        },
        "meta": {
            "current_page": page.page,
            "from": page.from(),
            "last_page": last_page,
            "path": path,
            "per_page": page.per_page,
            "to": page.to(),
            "total": page.total,
        },
    })
}

/// The request's own query with the page number replaced.
fn page_url(path: &str, params: &QueryParams, number: u32, size: u32) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter() {
        if key == PAGE_KEY {
            continue;
        }
        match value {
            ParamValue::Scalar(raw) => {
                query.append_pair(key, raw);
            }
            ParamValue::Nested(entries) => {
                for (inner, raw) in entries {
                    query.append_pair(&format!("{key}[{inner}]"), raw);
                }
            }
        }
    }
    query.append_pair("page[number]", &number.to_string());
    query.append_pair("page[size]", &size.to_string());
    format!("{path}?{}", query.finish())
}
