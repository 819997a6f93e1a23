//! Resolved query operations produced by the translator.

use std::fmt;

use crate::domain::types::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Date,
    /// Time of day, whatever the column's date part.
    Time,
    /// Stored in cents, filtered in currency units.
    Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeBound {
    /// Equality on the column (date part for dates, time part for times).
    Exact(String),
    /// Strictly greater than.
    After(String),
    /// Strictly less than.
    Before(String),
    /// Inclusive on both ends.
    Between(String, String),
}

/// Relations reachable through a `relation:field` filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Project,
    TimeFrame,
}

impl Relation {
    pub fn entity(self) -> EntityType {
        match self {
            Relation::Project => EntityType::Project,
            Relation::TimeFrame => EntityType::TimeFrame,
        }
    }
}

/// Opt-in aggregates requested via `add` or a computed method key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputedField {
    TimeFramesCount,
    TimeEntriesCount,
    TotalBillableSeconds,
}

impl ComputedField {
    pub fn name(self) -> &'static str {
        match self {
            ComputedField::TimeFramesCount => "timeFramesCount",
            ComputedField::TimeEntriesCount => "timeEntriesCount",
            ComputedField::TotalBillableSeconds => "totalBillableSeconds",
        }
    }

    /// Entity types whose rows feed the aggregate.
    pub fn sources(self) -> &'static [EntityType] {
        match self {
            ComputedField::TimeFramesCount => &[EntityType::TimeFrame],
            ComputedField::TimeEntriesCount => &[EntityType::TimeFrame, EntityType::TimeEntry],
            ComputedField::TotalBillableSeconds => &[EntityType::TimeEntry],
        }
    }
}

/// One eager-load request. `fields` is empty when every column is wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub relation: String,
    pub fields: Vec<String>,
}

impl fmt::Display for IncludeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            f.write_str(&self.relation)
        } else {
            write!(f, "{}:{}", self.relation, self.fields.join(","))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Identifier {
        column: &'static str,
        values: Vec<String>,
        negated: bool,
    },
    Range {
        column: &'static str,
        kind: RangeKind,
        bound: RangeBound,
    },
    Text {
        column: &'static str,
        pattern: String,
        negated: bool,
    },
    Enum {
        column: &'static str,
        value: String,
        negated: bool,
    },
    Boolean {
        column: &'static str,
        value: bool,
        negated: bool,
    },
    /// A predicate evaluated against a related row.
    Related {
        relation: Relation,
        operation: Box<Operation>,
    },
    Include(Vec<IncludeDirective>),
    IncludeCount(Vec<String>),
    Compute(ComputedField),
    Sort {
        column: String,
        direction: SortDirection,
    },
}

impl Operation {
    pub fn is_predicate(&self) -> bool {
        match self {
            Operation::Identifier { .. }
            | Operation::Range { .. }
            | Operation::Text { .. }
            | Operation::Enum { .. }
            | Operation::Boolean { .. }
            | Operation::Related { .. } => true,
            Operation::Include(_)
            | Operation::IncludeCount(_)
            | Operation::Compute(_)
            | Operation::Sort { .. } => false,
        }
    }
}
