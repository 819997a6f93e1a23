//! Renders translated [`Operation`]s into Postgres SQL.
//!
//! Every raw value is bound, never interpolated, and cast to the column's
//! type on the server. A value that does not parse as that type fails there
//! and comes back as invalid input. Column names reach the builder either
//! from a filter declaration or from a `sort` token, so they are always
//! quoted.

use sqlx::{Postgres, QueryBuilder};

use crate::application::filter::{
    Operation, RangeBound, RangeKind, Relation, SortDirection, TranslatedQuery,
};
use crate::domain::types::EntityType;

/// Alias of the primary table in every list or find statement.
pub const ROOT: &str = "t";
/// Alias used inside relation-qualified `EXISTS` subqueries.
const RELATED: &str = "r";
/// Identifier filters target uuid keys throughout the schema.
const IDENTIFIER_TYPE: &str = "uuid";

pub fn table(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Project => "projects",
        EntityType::TimeFrame => "time_frames",
        EntityType::TimeEntry => "time_entries",
        EntityType::Preference => "preferences",
    }
}

/// Preferences are deleted outright, everything else is soft deleted.
pub fn soft_deletes(entity: EntityType) -> bool {
    !matches!(entity, EntityType::Preference)
}

/// `alias."column"`, with embedded quotes doubled.
pub fn push_column(qb: &mut QueryBuilder<'_, Postgres>, alias: &str, column: &str) {
    qb.push(alias);
    qb.push(".\"");
    qb.push(column.replace('"', "\"\""));
    qb.push('"');
}

/// ` WHERE alias.deleted_at IS NULL AND ...` for every predicate in `query`.
pub fn push_where(qb: &mut QueryBuilder<'_, Postgres>, query: &TranslatedQuery) {
    qb.push(" WHERE ");
    if soft_deletes(query.entity) {
        qb.push(ROOT);
        qb.push(".deleted_at IS NULL");
    } else {
        qb.push("TRUE");
    }
    for operation in query.predicates() {
        qb.push(" AND ");
        push_predicate(qb, ROOT, operation);
    }
}

/// One predicate, parenthesised so conjunction never changes its meaning.
pub fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, alias: &str, operation: &Operation) {
    qb.push('(');
    match operation {
        Operation::Identifier {
            column,
            values,
            negated,
        } => {
            if *negated {
                qb.push("NOT ");
            }
            push_column(qb, alias, column);
            if let [value] = values.as_slice() {
                qb.push(" = CAST(");
                qb.push_bind(value.clone());
                qb.push(format!(" AS {IDENTIFIER_TYPE})"));
            } else {
                qb.push(" = ANY(CAST(");
                qb.push_bind(values.clone());
                qb.push(format!(" AS {IDENTIFIER_TYPE}[]))"));
            }
        }
        Operation::Range {
            column,
            kind,
            bound,
        } => push_range(qb, alias, column, *kind, bound),
        Operation::Text {
            column,
            pattern,
            negated,
        } => {
            if *negated {
                qb.push("COALESCE(");
                push_column(qb, alias, column);
                qb.push(", '') NOT ILIKE ");
            } else {
                push_column(qb, alias, column);
                qb.push(" ILIKE ");
            }
            qb.push_bind(pattern.clone());
        }
        Operation::Enum {
            column,
            value,
            negated,
        } => {
            push_column(qb, alias, column);
            qb.push(if *negated {
                " IS DISTINCT FROM "
            } else {
                " = "
            });
            qb.push_bind(value.clone());
        }
        Operation::Boolean {
            column,
            value,
            negated,
        } => {
            push_column(qb, alias, column);
            qb.push(" = ");
            qb.push_bind(*value != *negated);
        }
        Operation::Related {
            relation,
            operation,
        } => push_related(qb, alias, *relation, operation),
        Operation::Include(_)
        | Operation::IncludeCount(_)
        | Operation::Compute(_)
        | Operation::Sort { .. } => {
            qb.push("TRUE");
        }
    }
    qb.push(')');
}

fn push_range(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    column: &str,
    kind: RangeKind,
    bound: &RangeBound,
) {
    match bound {
        RangeBound::Exact(value) => {
            push_range_column(qb, alias, column, kind, true);
            qb.push(" = ");
            push_range_value(qb, value, kind);
        }
        RangeBound::After(value) => {
            push_range_column(qb, alias, column, kind, false);
            qb.push(" > ");
            push_range_value(qb, value, kind);
        }
        RangeBound::Before(value) => {
            push_range_column(qb, alias, column, kind, false);
            qb.push(" < ");
            push_range_value(qb, value, kind);
        }
        RangeBound::Between(from, to) => {
            push_range_column(qb, alias, column, kind, false);
            qb.push(" BETWEEN ");
            push_range_value(qb, from, kind);
            qb.push(" AND ");
            push_range_value(qb, to, kind);
        }
    }
}

/// Times always compare on the time of day; dates only truncate for equality.
fn push_range_column(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    column: &str,
    kind: RangeKind,
    exact: bool,
) {
    let part = match kind {
        RangeKind::Time => Some("time"),
        RangeKind::Date if exact => Some("date"),
        RangeKind::Date | RangeKind::Money => None,
    };
    match part {
        Some(part) => {
            qb.push("CAST(");
            push_column(qb, alias, column);
            qb.push(format!(" AS {part})"));
        }
        None => push_column(qb, alias, column),
    }
}

fn push_range_value(qb: &mut QueryBuilder<'_, Postgres>, value: &str, kind: RangeKind) {
    match kind {
        RangeKind::Date => push_cast(qb, value, "date"),
        RangeKind::Time => push_cast(qb, value, "time"),
        RangeKind::Money => {
            qb.push("(");
            push_cast(qb, value, "numeric");
            qb.push(" * 100)");
        }
    }
}

fn push_cast(qb: &mut QueryBuilder<'_, Postgres>, value: &str, cast: &str) {
    qb.push("CAST(");
    qb.push_bind(value.to_string());
    qb.push(format!(" AS {cast})"));
}

fn push_related(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    relation: Relation,
    operation: &Operation,
) {
    let (related_table, foreign_key) = match relation {
        Relation::Project => ("projects", "project_id"),
        Relation::TimeFrame => ("time_frames", "time_frame_id"),
    };
    qb.push(format!(
        "EXISTS (SELECT 1 FROM {related_table} {RELATED} WHERE {RELATED}.id = "
    ));
    push_column(qb, alias, foreign_key);
    qb.push(format!(" AND {RELATED}.deleted_at IS NULL AND "));
    push_predicate(qb, RELATED, operation);
    qb.push(')');
}

/// Requested sorts in request order, then `fallback`, then the id as a tie-breaker.
pub fn push_order_by(
    qb: &mut QueryBuilder<'_, Postgres>,
    query: &TranslatedQuery,
    fallback: Option<(&str, SortDirection)>,
) {
    qb.push(" ORDER BY ");
    let mut sorted = false;
    for (column, direction) in query.sorts() {
        push_column(qb, ROOT, column);
        qb.push(' ');
        qb.push(direction.as_sql());
        qb.push(", ");
        sorted = true;
    }
    if !sorted && let Some((column, direction)) = fallback {
        push_column(qb, ROOT, column);
        qb.push(' ');
        qb.push(direction.as_sql());
        qb.push(", ");
    }
    qb.push(ROOT);
    qb.push(".id ASC");
}

/// ` LIMIT $n OFFSET $m`.
pub fn push_page(qb: &mut QueryBuilder<'_, Postgres>, limit: u64, offset: u64) {
    qb.push(" LIMIT ");
    qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    qb.push(" OFFSET ");
    qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
}

pub fn convert_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::filter::{QueryParams, spec_for};

    fn where_sql(entity: EntityType, raw: &str) -> String {
        let query = spec_for(entity).translate(&QueryParams::parse(raw));
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM x t");
        push_where(&mut qb, &query);
        qb.sql().to_string()
    }

    #[test]
    fn identifier_lists_use_any_and_negation_wraps_the_whole_list() {
        assert_eq!(
            where_sql(EntityType::Project, "filter[id]=!a,b"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (NOT t.\"id\" = ANY(CAST($1 AS uuid[])))"
        );
        assert_eq!(
            where_sql(EntityType::Project, "id=a"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND (t.\"id\" = CAST($1 AS uuid))"
        );
    }

    #[test]
    fn text_filters_are_case_insensitive_and_negation_keeps_nulls() {
        assert_eq!(
            where_sql(EntityType::Project, "filter[name]=*acme*"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND (t.\"name\" ILIKE $1)"
        );
        assert_eq!(
            where_sql(EntityType::Project, "filter[description]=!*draft*"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (COALESCE(t.\"description\", '') NOT ILIKE $1)"
        );
    }

    #[test]
    fn range_bounds() {
        assert_eq!(
            where_sql(EntityType::TimeFrame, "filter[startDate]=2024-01-01,2024-01-31"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (t.\"start_date\" BETWEEN CAST($1 AS date) AND CAST($2 AS date))"
        );
        assert_eq!(
            where_sql(EntityType::TimeFrame, "filter[hourlyRate]=>10"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (t.\"hourly_rate\" > (CAST($1 AS numeric) * 100))"
        );
        assert_eq!(
            where_sql(EntityType::TimeEntry, "filter[startTime]=09:00"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (CAST(t.\"start_time\" AS time) = CAST($1 AS time))"
        );
    }

    #[test]
    fn time_bounds_compare_the_time_of_day() {
        let prefix = "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND ";
        assert_eq!(
            where_sql(EntityType::TimeEntry, "filter[startTime]=>09:00"),
            format!("{prefix}(CAST(t.\"start_time\" AS time) > CAST($1 AS time))")
        );
        assert_eq!(
            where_sql(EntityType::TimeEntry, "filter[endTime]=<17:30"),
            format!("{prefix}(CAST(t.\"end_time\" AS time) < CAST($1 AS time))")
        );
        assert_eq!(
            where_sql(EntityType::TimeEntry, "filter[startTime]=09:00,12:00"),
            format!(
                "{prefix}(CAST(t.\"start_time\" AS time) BETWEEN CAST($1 AS time) \
                 AND CAST($2 AS time))"
            )
        );
    }

    #[test]
    fn enum_and_boolean_negation() {
        assert_eq!(
            where_sql(EntityType::TimeFrame, "filter[status]=!canceled"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (t.\"status\" IS DISTINCT FROM $1)"
        );
        assert_eq!(
            where_sql(EntityType::TimeEntry, "filter[billable]=!true"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND (t.\"billable\" = $1)"
        );
    }

    #[test]
    fn relation_qualified_filters_become_exists_subqueries() {
        assert_eq!(
            where_sql(EntityType::TimeFrame, "filter[project:slug]=acme"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND \
             (EXISTS (SELECT 1 FROM projects r WHERE r.id = t.\"project_id\" \
             AND r.deleted_at IS NULL AND (r.\"slug\" = $1)))"
        );
    }

    #[test]
    fn preferences_have_no_soft_delete_clause() {
        assert_eq!(
            where_sql(EntityType::Preference, "filter[id]=x"),
            "SELECT 1 FROM x t WHERE TRUE AND (t.\"id\" = CAST($1 AS uuid))"
        );
    }

    #[test]
    fn predicates_compose_in_request_order() {
        assert_eq!(
            where_sql(EntityType::TimeEntry, "filter[billable]=1&filter[workDay]=<2024-02-01"),
            "SELECT 1 FROM x t WHERE t.deleted_at IS NULL AND (t.\"billable\" = $1) \
             AND (t.\"work_day\" < CAST($2 AS date))"
        );
    }

    #[test]
    fn order_by_follows_sort_tokens_then_id() {
        let query = spec_for(EntityType::TimeFrame)
            .translate(&QueryParams::parse("sort=-startDate,name,_virtual"));
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_order_by(&mut qb, &query, Some(("created_at", SortDirection::Desc)));
        assert_eq!(
            qb.sql(),
            " ORDER BY t.\"start_date\" DESC, t.\"name\" ASC, t.id ASC"
        );
    }

    #[test]
    fn order_by_falls_back_when_unsorted() {
        let query = spec_for(EntityType::Project).translate(&QueryParams::new());
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_order_by(&mut qb, &query, Some(("created_at", SortDirection::Desc)));
        assert_eq!(qb.sql(), " ORDER BY t.\"created_at\" DESC, t.id ASC");
    }

    #[test]
    fn unmapped_sort_names_are_quoted() {
        let query =
            spec_for(EntityType::Project).translate(&QueryParams::parse("sort=na\"me"));
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_order_by(&mut qb, &query, None);
        assert_eq!(qb.sql(), " ORDER BY t.\"na\"\"me\" ASC, t.id ASC");
    }
}
