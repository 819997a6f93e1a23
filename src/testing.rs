//! In-memory repositories shared by unit and integration tests.
//!
//! Rows live in plain vectors. Lists and finds evaluate the translated
//! predicates, sorts and includes the way the Postgres repositories render
//! them, so filter behaviour can be asserted against actual rows. Parent
//! references are checked on write like the foreign keys are.

use std::cmp::Ordering as SortOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::macros::{date, format_description};
use time::{Date, OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

use crate::application::filter::{
    ComputedField, Operation, RangeBound, RangeKind, Relation, SortDirection, TranslatedQuery,
};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CreateProjectParams, CreateTimeEntryParams, CreateTimeFrameParams, PreferencesRepo,
    PreferencesWriteRepo, ProjectLookup, ProjectsRepo, ProjectsWriteRepo, RepoError,
    TimeEntriesRepo, TimeEntriesWriteRepo, TimeFramesRepo, TimeFramesWriteRepo,
    UpdateProjectParams, UpdateTimeEntryParams, UpdateTimeFrameParams, UpsertPreferenceParams,
};
use crate::application::services::QueryCache;
use crate::cache::{CacheConfig, CacheHandles};
use crate::domain::entities::{PreferenceRecord, ProjectRecord, TimeEntryRecord, TimeFrameRecord};
use crate::domain::types::TimeFrameStatus;

/// A fresh in-memory cache with default settings.
pub fn cache() -> QueryCache {
    QueryCache::from_handles(&CacheHandles::in_memory(CacheConfig::default()))
}

fn lock<T>(rows: &Mutex<T>) -> MutexGuard<'_, T> {
    rows.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Default)]
pub struct MemoryRepos {
    projects: Mutex<Vec<ProjectRecord>>,
    time_frames: Mutex<Vec<TimeFrameRecord>>,
    time_entries: Mutex<Vec<TimeEntryRecord>>,
    preferences: Mutex<Vec<PreferenceRecord>>,
    list_calls: AtomicUsize,
    find_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryRepos {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Storage reads served so far; cache hits do not count.
    pub fn reads(&self) -> usize {
        self.list_calls() + self.find_calls()
    }

    /// Every later write fails as a persistence error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Insert a project directly, bypassing services and the write switch.
    pub fn seed_project(&self, name: &str) -> ProjectRecord {
        let record = ProjectRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug::slugify(name),
            description: None,
            additional_properties: serde_json::json!({}),
            created_at: now(),
            updated_at: now(),
            time_frames_count: None,
            time_entries_count: None,
            time_frames: None,
            time_entries: None,
        };
        lock(&self.projects).push(record.clone());
        record
    }

    /// Insert an in-progress March 2024 frame under `project_id`.
    pub fn seed_time_frame(&self, project_id: Uuid) -> TimeFrameRecord {
        let record = TimeFrameRecord {
            id: Uuid::new_v4(),
            project_id,
            start_date: date!(2024 - 03 - 01),
            end_date: date!(2024 - 03 - 31),
            name: Some("March".to_string()),
            status: TimeFrameStatus::InProgress,
            notes: None,
            hourly_rate: Some(8000),
            currency: Some("USD".to_string()),
            created_at: now(),
            updated_at: now(),
            total_billable_seconds: None,
            time_entries_count: None,
            time_entries: None,
            project: None,
        };
        lock(&self.time_frames).push(record.clone());
        record
    }

    fn check_write(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("write rejected"));
        }
        Ok(())
    }

    fn project(&self, id: Uuid) -> Option<ProjectRecord> {
        lock(&self.projects)
            .iter()
            .find(|project| project.id == id)
            .cloned()
    }

    fn time_frame(&self, id: Uuid) -> Option<TimeFrameRecord> {
        lock(&self.time_frames)
            .iter()
            .find(|frame| frame.id == id)
            .cloned()
    }

    fn frames_of(&self, project_id: Uuid) -> Vec<TimeFrameRecord> {
        lock(&self.time_frames)
            .iter()
            .filter(|frame| frame.project_id == project_id)
            .cloned()
            .collect()
    }

    fn entries_of(&self, frame_id: Uuid) -> Vec<TimeEntryRecord> {
        lock(&self.time_entries)
            .iter()
            .filter(|entry| entry.time_frame_id == frame_id)
            .cloned()
            .collect()
    }

    fn entries_of_project(&self, project_id: Uuid) -> Vec<TimeEntryRecord> {
        self.frames_of(project_id)
            .iter()
            .flat_map(|frame| self.entries_of(frame.id))
            .collect()
    }

    fn require_project(&self, id: Uuid) -> Result<(), RepoError> {
        match self.project(id) {
            Some(_) => Ok(()),
            None => Err(RepoError::invalid_input(
                "project_id does not reference a live project",
            )),
        }
    }

    fn require_time_frame(&self, id: Uuid) -> Result<(), RepoError> {
        match self.time_frame(id) {
            Some(_) => Ok(()),
            None => Err(RepoError::invalid_input(
                "time_frame_id does not reference a live time frame",
            )),
        }
    }

    /// Rows passing every predicate of `query`.
    fn select<R: Row>(&self, rows: Vec<R>, query: &TranslatedQuery) -> Result<Vec<R>, RepoError> {
        let mut selected = Vec::with_capacity(rows.len());
        for row in rows {
            if self.passes(&row, query)? {
                selected.push(row);
            }
        }
        Ok(selected)
    }

    fn passes<R: Row>(&self, row: &R, query: &TranslatedQuery) -> Result<bool, RepoError> {
        for operation in query.predicates() {
            if !self.evaluate(row, operation)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate<R: Row>(&self, row: &R, operation: &Operation) -> Result<bool, RepoError> {
        match operation {
            Operation::Identifier {
                column,
                values,
                negated,
            } => {
                let wanted = values
                    .iter()
                    .map(|value| {
                        Uuid::parse_str(value).map_err(|_| {
                            RepoError::invalid_input(format!(
                                "invalid input syntax for type uuid: \"{value}\""
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match row.cell(column) {
                    Cell::Uuid(id) => wanted.contains(&id) != *negated,
                    _ => false,
                })
            }
            Operation::Range {
                column,
                kind,
                bound,
            } => range_matches(row.cell(column), *kind, bound),
            Operation::Text {
                column,
                pattern,
                negated,
            } => Ok(match (row.cell(column), *negated) {
                (Cell::Text(value), false) => ilike(&value, pattern),
                (Cell::Text(value), true) => !ilike(&value, pattern),
                (_, true) => !ilike("", pattern),
                (_, false) => false,
            }),
            Operation::Enum {
                column,
                value,
                negated,
            } => Ok(match row.cell(column) {
                Cell::Text(stored) => (stored == *value) != *negated,
                _ => *negated,
            }),
            Operation::Boolean {
                column,
                value,
                negated,
            } => Ok(match row.cell(column) {
                Cell::Bool(stored) => stored == (*value != *negated),
                _ => false,
            }),
            Operation::Related {
                relation,
                operation,
            } => {
                let key = match relation {
                    Relation::Project => "project_id",
                    Relation::TimeFrame => "time_frame_id",
                };
                let Cell::Uuid(related_id) = row.cell(key) else {
                    return Ok(false);
                };
                match relation {
                    Relation::Project => match self.project(related_id) {
                        Some(project) => self.evaluate(&project, operation),
                        None => Ok(false),
                    },
                    Relation::TimeFrame => match self.time_frame(related_id) {
                        Some(frame) => self.evaluate(&frame, operation),
                        None => Ok(false),
                    },
                }
            }
            Operation::Include(_)
            | Operation::IncludeCount(_)
            | Operation::Compute(_)
            | Operation::Sort { .. } => Ok(true),
        }
    }

    fn list<R: Row>(
        &self,
        rows: Vec<R>,
        query: &TranslatedQuery,
        page: PageRequest,
        fallback: (&str, SortDirection),
    ) -> Result<Paginated<R>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.select(rows, query)?;
        sort_rows(&mut rows, query, fallback)?;

        let total = rows.len() as u64;
        let data = rows
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok(Paginated::new(data, total, page))
    }

    fn find<R: Row>(&self, row: Option<R>, query: &TranslatedQuery) -> Result<Option<R>, RepoError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        match row {
            Some(row) if self.passes(&row, query)? => Ok(Some(row)),
            _ => Ok(None),
        }
    }

    fn shape_project(&self, mut project: ProjectRecord, query: &TranslatedQuery) -> ProjectRecord {
        let counts: Vec<&str> = query.include_counts().collect();
        if query.computes(ComputedField::TimeFramesCount) || counts.contains(&"timeFrames") {
            project.time_frames_count = Some(self.frames_of(project.id).len() as i64);
        }
        if query.computes(ComputedField::TimeEntriesCount) || counts.contains(&"timeEntries") {
            project.time_entries_count = Some(self.entries_of_project(project.id).len() as i64);
        }
        if query.include("timeFrames").is_some() {
            project.time_frames = Some(self.frames_of(project.id));
        }
        if query.include("timeEntries").is_some() {
            project.time_entries = Some(self.entries_of_project(project.id));
        }
        project
    }

    fn shape_time_frame(&self, mut frame: TimeFrameRecord, query: &TranslatedQuery) -> TimeFrameRecord {
        let mut entries = self.entries_of(frame.id);
        entries.sort_by(|a, b| {
            b.work_day
                .cmp(&a.work_day)
                .then(b.start_time.cmp(&a.start_time))
        });
        if query.computes(ComputedField::TotalBillableSeconds) {
            frame.total_billable_seconds = Some(
                entries
                    .iter()
                    .filter(|entry| entry.billable)
                    .filter_map(TimeEntryRecord::duration_seconds)
                    .sum::<i64>() as f64,
            );
        }
        if query.include_counts().any(|relation| relation == "timeEntries") {
            frame.time_entries_count = Some(entries.len() as i64);
        }
        if query.include("timeEntries").is_some() {
            frame.time_entries = Some(entries);
        }
        if query.include("project").is_some() {
            frame.project = self.project(frame.project_id).map(Box::new);
        }
        frame
    }

    fn shape_time_entry(&self, mut entry: TimeEntryRecord, query: &TranslatedQuery) -> TimeEntryRecord {
        if query.include("timeFrame").is_some() {
            entry.time_frame = self.time_frame(entry.time_frame_id).map(Box::new);
        }
        entry
    }
}

/// A column value as the predicates see it.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum Cell {
    Null,
    Uuid(Uuid),
    Text(String),
    Date(Date),
    Instant(OffsetDateTime),
    Int(i64),
    Bool(bool),
}

impl Cell {
    fn text(value: Option<&str>) -> Self {
        value.map_or(Cell::Null, |value| Cell::Text(value.to_string()))
    }
}

trait Row {
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Uuid;

    /// `Cell::Null` for NULL and for columns outside `COLUMNS`.
    fn cell(&self, column: &str) -> Cell;
}

impl Row for ProjectRecord {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "slug",
        "description",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn cell(&self, column: &str) -> Cell {
        match column {
            "id" => Cell::Uuid(self.id),
            "name" => Cell::Text(self.name.clone()),
            "slug" => Cell::Text(self.slug.clone()),
            "description" => Cell::text(self.description.as_deref()),
            "created_at" => Cell::Instant(self.created_at),
            "updated_at" => Cell::Instant(self.updated_at),
            _ => Cell::Null,
        }
    }
}

impl Row for TimeFrameRecord {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "project_id",
        "start_date",
        "end_date",
        "name",
        "status",
        "notes",
        "hourly_rate",
        "currency",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn cell(&self, column: &str) -> Cell {
        match column {
            "id" => Cell::Uuid(self.id),
            "project_id" => Cell::Uuid(self.project_id),
            "start_date" => Cell::Date(self.start_date),
            "end_date" => Cell::Date(self.end_date),
            "name" => Cell::text(self.name.as_deref()),
            "status" => Cell::Text(self.status.as_str().to_string()),
            "notes" => Cell::text(self.notes.as_deref()),
            "hourly_rate" => self.hourly_rate.map_or(Cell::Null, Cell::Int),
            "currency" => Cell::text(self.currency.as_deref()),
            "created_at" => Cell::Instant(self.created_at),
            "updated_at" => Cell::Instant(self.updated_at),
            _ => Cell::Null,
        }
    }
}

impl Row for TimeEntryRecord {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "time_frame_id",
        "work_day",
        "start_time",
        "end_time",
        "description",
        "billable",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn cell(&self, column: &str) -> Cell {
        match column {
            "id" => Cell::Uuid(self.id),
            "time_frame_id" => Cell::Uuid(self.time_frame_id),
            "work_day" => Cell::Date(self.work_day),
            "start_time" => Cell::Instant(self.start_time),
            "end_time" => self.end_time.map_or(Cell::Null, Cell::Instant),
            "description" => Cell::text(self.description.as_deref()),
            "billable" => Cell::Bool(self.billable),
            "created_at" => Cell::Instant(self.created_at),
            "updated_at" => Cell::Instant(self.updated_at),
            _ => Cell::Null,
        }
    }
}

impl Row for PreferenceRecord {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "hourly_rate",
        "currency",
        "week_start",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn cell(&self, column: &str) -> Cell {
        match column {
            "id" => Cell::Uuid(self.id),
            "hourly_rate" => Cell::Int(self.hourly_rate),
            "currency" => Cell::Text(self.currency.clone()),
            "week_start" => Cell::Text(self.week_start.as_str().to_string()),
            "created_at" => Cell::Instant(self.created_at),
            "updated_at" => Cell::Instant(self.updated_at),
            _ => Cell::Null,
        }
    }
}

/// Requested sorts, else `fallback`, then the id. NULLs sort last ascending.
fn sort_rows<R: Row>(
    rows: &mut [R],
    query: &TranslatedQuery,
    fallback: (&str, SortDirection),
) -> Result<(), RepoError> {
    let mut orders: Vec<(String, SortDirection)> = query
        .sorts()
        .map(|(column, direction)| (column.to_string(), direction))
        .collect();
    if orders.is_empty() {
        orders.push((fallback.0.to_string(), fallback.1));
    }
    if let Some((column, _)) = orders
        .iter()
        .find(|(column, _)| !R::COLUMNS.contains(&column.as_str()))
    {
        return Err(RepoError::invalid_input(format!(
            "column t.\"{column}\" does not exist"
        )));
    }

    rows.sort_by(|a, b| {
        orders
            .iter()
            .map(|(column, direction)| compare(&a.cell(column), &b.cell(column), *direction))
            .find(|ordering| *ordering != SortOrdering::Equal)
            .unwrap_or_else(|| a.id().cmp(&b.id()))
    });
    Ok(())
}

fn compare(a: &Cell, b: &Cell, direction: SortDirection) -> SortOrdering {
    let ordering = match (a, b) {
        (Cell::Null, Cell::Null) => SortOrdering::Equal,
        (Cell::Null, _) => SortOrdering::Greater,
        (_, Cell::Null) => SortOrdering::Less,
        _ => a.partial_cmp(b).unwrap_or(SortOrdering::Equal),
    };
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Comparable side of a range predicate.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Scalar {
    Date(Date),
    Time(Time),
    Number(f64),
}

fn range_matches(cell: Cell, kind: RangeKind, bound: &RangeBound) -> Result<bool, RepoError> {
    let Some(stored) = column_scalar(cell, kind)? else {
        return Ok(false);
    };
    Ok(match bound {
        RangeBound::Exact(value) => stored == value_scalar(value, kind)?,
        RangeBound::After(value) => stored > value_scalar(value, kind)?,
        RangeBound::Before(value) => stored < value_scalar(value, kind)?,
        RangeBound::Between(from, to) => {
            stored >= value_scalar(from, kind)? && stored <= value_scalar(to, kind)?
        }
    })
}

fn column_scalar(cell: Cell, kind: RangeKind) -> Result<Option<Scalar>, RepoError> {
    Ok(Some(match (kind, cell) {
        (_, Cell::Null) => return Ok(None),
        (RangeKind::Date, Cell::Date(date)) => Scalar::Date(date),
        (RangeKind::Date, Cell::Instant(at)) => Scalar::Date(at.to_offset(UtcOffset::UTC).date()),
        (RangeKind::Time, Cell::Instant(at)) => Scalar::Time(at.to_offset(UtcOffset::UTC).time()),
        (RangeKind::Money, Cell::Int(cents)) => Scalar::Number(cents as f64),
        (kind, cell) => {
            return Err(RepoError::invalid_input(format!(
                "cannot compare {cell:?} as {kind:?}"
            )));
        }
    }))
}

fn value_scalar(raw: &str, kind: RangeKind) -> Result<Scalar, RepoError> {
    let invalid = || RepoError::invalid_input(format!("invalid {kind:?} value: \"{raw}\""));
    match kind {
        RangeKind::Date => Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .map(Scalar::Date)
            .map_err(|_| invalid()),
        RangeKind::Time => Time::parse(raw, format_description!("[hour]:[minute]:[second]"))
            .or_else(|_| Time::parse(raw, format_description!("[hour]:[minute]")))
            .map(Scalar::Time)
            .map_err(|_| invalid()),
        RangeKind::Money => raw
            .trim()
            .parse::<f64>()
            .map(|units| Scalar::Number(units * 100.0))
            .map_err(|_| invalid()),
    }
}

/// `ILIKE`: `%` spans any run, `_` one character, `\` escapes.
fn ilike(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    like(&value, &pattern)
}

fn like(value: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some(('%', rest)) => (0..=value.len()).any(|skip| like(&value[skip..], rest)),
        Some(('_', rest)) => !value.is_empty() && like(&value[1..], rest),
        Some(('\\', [literal, rest @ ..])) => {
            value.first() == Some(literal) && like(&value[1..], rest)
        }
        Some((literal, rest)) => value.first() == Some(literal) && like(&value[1..], rest),
    }
}

#[async_trait]
impl ProjectsRepo for MemoryRepos {
    async fn list_projects(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<ProjectRecord>, RepoError> {
        let rows = lock(&self.projects).clone();
        let mut page = self.list(rows, query, page, ("created_at", SortDirection::Desc))?;
        page.data = page
            .data
            .into_iter()
            .map(|project| self.shape_project(project, query))
            .collect();
        Ok(page)
    }

    async fn find_project(
        &self,
        lookup: &ProjectLookup,
        query: &TranslatedQuery,
    ) -> Result<Option<ProjectRecord>, RepoError> {
        let row = lock(&self.projects)
            .iter()
            .find(|project| match lookup {
                ProjectLookup::Id(id) => project.id == *id,
                ProjectLookup::Slug(slug) => project.slug == *slug,
            })
            .cloned();
        Ok(self
            .find(row, query)?
            .map(|project| self.shape_project(project, query)))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        Ok(lock(&self.projects)
            .iter()
            .any(|project| project.slug == slug && Some(project.id) != exclude))
    }
}

#[async_trait]
impl ProjectsWriteRepo for MemoryRepos {
    async fn create_project(&self, params: CreateProjectParams) -> Result<ProjectRecord, RepoError> {
        self.check_write()?;
        let record = ProjectRecord {
            id: Uuid::new_v4(),
            name: params.name,
            slug: params.slug,
            description: params.description,
            additional_properties: params.additional_properties,
            created_at: now(),
            updated_at: now(),
            time_frames_count: None,
            time_entries_count: None,
            time_frames: None,
            time_entries: None,
        };
        lock(&self.projects).push(record.clone());
        Ok(record)
    }

    async fn update_project(&self, params: UpdateProjectParams) -> Result<ProjectRecord, RepoError> {
        self.check_write()?;
        let mut projects = lock(&self.projects);
        let project = projects
            .iter_mut()
            .find(|project| project.id == params.id)
            .ok_or(RepoError::NotFound)?;
        project.name = params.name;
        project.slug = params.slug;
        project.description = params.description;
        project.additional_properties = params.additional_properties;
        project.updated_at = now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), RepoError> {
        self.check_write()?;
        let mut projects = lock(&self.projects);
        let before = projects.len();
        projects.retain(|project| project.id != id);
        if projects.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TimeFramesRepo for MemoryRepos {
    async fn list_time_frames(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<TimeFrameRecord>, RepoError> {
        let rows = lock(&self.time_frames).clone();
        let mut page = self.list(rows, query, page, ("start_date", SortDirection::Desc))?;
        page.data = page
            .data
            .into_iter()
            .map(|frame| self.shape_time_frame(frame, query))
            .collect();
        Ok(page)
    }

    async fn find_time_frame(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<TimeFrameRecord>, RepoError> {
        let row = self.time_frame(id);
        Ok(self
            .find(row, query)?
            .map(|frame| self.shape_time_frame(frame, query)))
    }
}

#[async_trait]
impl TimeFramesWriteRepo for MemoryRepos {
    async fn create_time_frame(
        &self,
        params: CreateTimeFrameParams,
    ) -> Result<TimeFrameRecord, RepoError> {
        self.check_write()?;
        self.require_project(params.project_id)?;
        let record = TimeFrameRecord {
            id: Uuid::new_v4(),
            project_id: params.project_id,
            start_date: params.start_date,
            end_date: params.end_date,
            name: params.name,
            status: params.status,
            notes: params.notes,
            hourly_rate: params.hourly_rate,
            currency: params.currency,
            created_at: now(),
            updated_at: now(),
            total_billable_seconds: None,
            time_entries_count: None,
            time_entries: None,
            project: None,
        };
        lock(&self.time_frames).push(record.clone());
        Ok(record)
    }

    async fn update_time_frame(
        &self,
        params: UpdateTimeFrameParams,
    ) -> Result<TimeFrameRecord, RepoError> {
        self.check_write()?;
        self.require_project(params.project_id)?;
        let mut frames = lock(&self.time_frames);
        let frame = frames
            .iter_mut()
            .find(|frame| frame.id == params.id)
            .ok_or(RepoError::NotFound)?;
        frame.project_id = params.project_id;
        frame.start_date = params.start_date;
        frame.end_date = params.end_date;
        frame.name = params.name;
        frame.status = params.status;
        frame.notes = params.notes;
        frame.hourly_rate = params.hourly_rate;
        frame.currency = params.currency;
        frame.updated_at = now();
        Ok(frame.clone())
    }

    async fn delete_time_frame(&self, id: Uuid) -> Result<(), RepoError> {
        self.check_write()?;
        let mut frames = lock(&self.time_frames);
        let before = frames.len();
        frames.retain(|frame| frame.id != id);
        if frames.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TimeEntriesRepo for MemoryRepos {
    async fn list_time_entries(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<TimeEntryRecord>, RepoError> {
        let rows = lock(&self.time_entries).clone();
        let mut page = self.list(rows, query, page, ("start_time", SortDirection::Desc))?;
        page.data = page
            .data
            .into_iter()
            .map(|entry| self.shape_time_entry(entry, query))
            .collect();
        Ok(page)
    }

    async fn find_time_entry(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<TimeEntryRecord>, RepoError> {
        let row = lock(&self.time_entries)
            .iter()
            .find(|entry| entry.id == id)
            .cloned();
        Ok(self
            .find(row, query)?
            .map(|entry| self.shape_time_entry(entry, query)))
    }
}

#[async_trait]
impl TimeEntriesWriteRepo for MemoryRepos {
    async fn create_time_entry(
        &self,
        params: CreateTimeEntryParams,
    ) -> Result<TimeEntryRecord, RepoError> {
        self.check_write()?;
        self.require_time_frame(params.time_frame_id)?;
        let record = TimeEntryRecord {
            id: Uuid::new_v4(),
            time_frame_id: params.time_frame_id,
            work_day: params.work_day,
            start_time: params.start_time,
            end_time: params.end_time,
            description: params.description,
            billable: params.billable,
            created_at: now(),
            updated_at: now(),
            time_frame: None,
        };
        lock(&self.time_entries).push(record.clone());
        Ok(record)
    }

    async fn update_time_entry(
        &self,
        params: UpdateTimeEntryParams,
    ) -> Result<TimeEntryRecord, RepoError> {
        self.check_write()?;
        self.require_time_frame(params.time_frame_id)?;
        let mut entries = lock(&self.time_entries);
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == params.id)
            .ok_or(RepoError::NotFound)?;
        entry.time_frame_id = params.time_frame_id;
        entry.work_day = params.work_day;
        entry.start_time = params.start_time;
        entry.end_time = params.end_time;
        entry.description = params.description;
        entry.billable = params.billable;
        entry.updated_at = now();
        Ok(entry.clone())
    }

    async fn delete_time_entry(&self, id: Uuid) -> Result<(), RepoError> {
        self.check_write()?;
        let mut entries = lock(&self.time_entries);
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PreferencesRepo for MemoryRepos {
    async fn list_preferences(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<PreferenceRecord>, RepoError> {
        let rows = lock(&self.preferences).clone();
        self.list(rows, query, page, ("created_at", SortDirection::Asc))
    }

    async fn find_preference(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<PreferenceRecord>, RepoError> {
        let row = lock(&self.preferences)
            .iter()
            .find(|preference| preference.id == id)
            .cloned();
        self.find(row, query)
    }

    async fn first_preference(&self) -> Result<Option<PreferenceRecord>, RepoError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = lock(&self.preferences).clone();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PreferencesWriteRepo for MemoryRepos {
    async fn create_preference(
        &self,
        params: UpsertPreferenceParams,
    ) -> Result<PreferenceRecord, RepoError> {
        self.check_write()?;
        let record = PreferenceRecord {
            id: Uuid::new_v4(),
            hourly_rate: params.hourly_rate,
            currency: params.currency,
            week_start: params.week_start,
            additional_properties: params.additional_properties,
            created_at: now(),
            updated_at: now(),
        };
        lock(&self.preferences).push(record.clone());
        Ok(record)
    }

    async fn update_preference(
        &self,
        id: Uuid,
        params: UpsertPreferenceParams,
    ) -> Result<PreferenceRecord, RepoError> {
        self.check_write()?;
        let mut preferences = lock(&self.preferences);
        let preference = preferences
            .iter_mut()
            .find(|preference| preference.id == id)
            .ok_or(RepoError::NotFound)?;
        preference.hourly_rate = params.hourly_rate;
        preference.currency = params.currency;
        preference.week_start = params.week_start;
        preference.additional_properties = params.additional_properties;
        preference.updated_at = now();
        Ok(preference.clone())
    }

    async fn delete_preference(&self, id: Uuid) -> Result<(), RepoError> {
        self.check_write()?;
        let mut preferences = lock(&self.preferences);
        let before = preferences.len();
        preferences.retain(|preference| preference.id != id);
        if preferences.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilike_follows_wildcards_and_ignores_case() {
        assert!(ilike("Acme Portal", "%acme%"));
        assert!(ilike("Acme Portal", "acme%"));
        assert!(!ilike("The Acme", "acme%"));
        assert!(ilike("v1", "v_"));
        assert!(!ilike("v12", "v_"));
        assert!(ilike("100%", "100\\%"));
        assert!(!ilike("1000", "100\\%"));
    }

    #[test]
    fn nulls_sort_last_ascending_and_first_descending() {
        let mut cells = vec![Cell::Int(2), Cell::Null, Cell::Int(1)];
        cells.sort_by(|a, b| compare(a, b, SortDirection::Asc));
        assert_eq!(cells, [Cell::Int(1), Cell::Int(2), Cell::Null]);
        cells.sort_by(|a, b| compare(a, b, SortDirection::Desc));
        assert_eq!(cells, [Cell::Null, Cell::Int(2), Cell::Int(1)]);
    }

    #[test]
    fn money_bounds_are_in_currency_units() {
        let between = RangeBound::Between("80".into(), "90.5".into());
        assert!(range_matches(Cell::Int(8000), RangeKind::Money, &between).unwrap());
        assert!(range_matches(Cell::Int(9050), RangeKind::Money, &between).unwrap());
        assert!(!range_matches(Cell::Int(9051), RangeKind::Money, &between).unwrap());
        assert!(!range_matches(Cell::Null, RangeKind::Money, &between).unwrap());
    }

    #[test]
    fn malformed_bounds_are_invalid_input() {
        let err = range_matches(
            Cell::Date(Date::MIN),
            RangeKind::Date,
            &RangeBound::After("March".into()),
        )
        .unwrap_err();
        assert!(matches!(err, RepoError::InvalidInput { .. }));
    }
}
