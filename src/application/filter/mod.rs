//! Request-to-query translation.
//!
//! A [`FilterSpec`] declares, per entity type, which parameter names resolve
//! to which typed filter. [`FilterSpec::translate`] walks a [`QueryParams`]
//! map in transport order and produces the [`Operation`] sequence the
//! storage layer applies. Names that resolve to nothing are dropped silently.

mod operation;
mod params;
mod primitives;
mod specs;

use std::collections::{BTreeSet, HashMap};

pub use operation::{
    ComputedField, IncludeDirective, Operation, RangeBound, RangeKind, Relation, SortDirection,
};
pub use params::{ParamValue, QueryParams};
pub use primitives::{decode_include, parse_bool};
pub use specs::spec_for;

use crate::domain::types::EntityType;

pub const FILTER_KEY: &str = "filter";
pub const SORT_KEY: &str = "sort";
pub const INCLUDE_KEY: &str = "include";
pub const INCLUDE_COUNT_KEY: &str = "includeCount";
pub const ADD_KEY: &str = "add";
/// Not an operation, but it changes the result set, so it stays in the cache identity.
pub const PAGE_KEY: &str = "page";

/// Typed handler a parameter name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Identifier(&'static str),
    Date(&'static str),
    Time(&'static str),
    Money(&'static str),
    Text(&'static str),
    Enum(&'static str),
    Boolean(&'static str),
    Computed(ComputedField),
    /// Two-argument form: `relation:field` delegates `field` to the related spec.
    Related(Relation),
}

#[derive(Debug)]
pub struct FilterSpec {
    pub entity: EntityType,
    pub sortable: &'static [(&'static str, &'static str)],
    methods: HashMap<&'static str, Method>,
    relations: &'static [(&'static str, &'static [EntityType])],
}

impl FilterSpec {
    pub fn new(
        entity: EntityType,
        sortable: &'static [(&'static str, &'static str)],
        methods: impl IntoIterator<Item = (&'static str, Method)>,
        relations: &'static [(&'static str, &'static [EntityType])],
    ) -> Self {
        Self {
            entity,
            sortable,
            methods: methods.into_iter().collect(),
            relations,
        }
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    /// Entity types an eager-loadable relation reads from.
    pub fn relation_sources(&self, relation: &str) -> Option<&'static [EntityType]> {
        self.relations
            .iter()
            .find(|(name, _)| *name == relation)
            .map(|(_, sources)| *sources)
    }

    pub fn has_relation(&self, relation: &str) -> bool {
        self.relation_sources(relation).is_some()
    }

    /// Resolve every recognised parameter into operations, in transport order.
    pub fn translate(&self, params: &QueryParams) -> TranslatedQuery {
        let mut operations = Vec::new();
        let mut recognised = QueryParams::new();

        for (key, value) in params.iter() {
            match (key, value) {
                (FILTER_KEY, ParamValue::Nested(entries)) => {
                    for (inner, raw) in entries {
                        if self.apply_filter_key(inner, raw, &mut operations) {
                            recognised.insert_nested(FILTER_KEY, inner, raw.as_str());
                        }
                    }
                }
                (SORT_KEY, ParamValue::Scalar(raw)) => {
                    operations.extend(primitives::sort(raw, self.sortable));
                    recognised.insert_scalar(key, raw.as_str());
                }
                (INCLUDE_KEY, ParamValue::Scalar(raw)) => {
                    let directives = primitives::decode_include(raw);
                    if !directives.is_empty() {
                        operations.push(Operation::Include(directives));
                    }
                    recognised.insert_scalar(key, raw.as_str());
                }
                (INCLUDE_COUNT_KEY, ParamValue::Scalar(raw)) => {
                    let relations: Vec<String> =
                        primitives::split_list(raw).map(str::to_string).collect();
                    if !relations.is_empty() {
                        operations.push(Operation::IncludeCount(relations));
                    }
                    recognised.insert_scalar(key, raw.as_str());
                }
                (ADD_KEY, ParamValue::Scalar(raw)) => {
                    for token in primitives::split_list(raw) {
                        if let Some(Method::Computed(field)) = self.method(token) {
                            operations.push(Operation::Compute(field));
                        }
                    }
                    recognised.insert_scalar(key, raw.as_str());
                }
                (PAGE_KEY, value) => recognised.insert(key, value.clone()),
                (_, ParamValue::Scalar(raw)) => {
                    if self.apply_direct(key, raw, &mut operations) {
                        recognised.insert_scalar(key, raw.as_str());
                    }
                }
                (_, ParamValue::Nested(_)) => {}
            }
        }

        TranslatedQuery {
            entity: self.entity,
            operations,
            params: recognised,
        }
    }

    /// Returns whether the key resolved to a method, even when it yielded no operation.
    fn apply_direct(&self, key: &str, raw: &str, operations: &mut Vec<Operation>) -> bool {
        match self.method(key) {
            None | Some(Method::Related(_)) => false,
            Some(method) => {
                operations.extend(apply_method(method, raw));
                true
            }
        }
    }

    /// Inside `filter[...]` a key may also name a relation and one of its fields.
    fn apply_filter_key(&self, key: &str, raw: &str, operations: &mut Vec<Operation>) -> bool {
        if self.method(key).is_some() {
            return self.apply_direct(key, raw, operations);
        }

        let Some((name, field)) = key.split_once(':') else {
            return false;
        };
        let Some(Method::Related(relation)) = self.method(name) else {
            return false;
        };
        let related = spec_for(relation.entity());
        match related.method(field) {
            Some(Method::Related(_) | Method::Computed(_)) | None => false,
            Some(method) => {
                operations.extend(apply_method(method, raw).map(|operation| {
                    Operation::Related {
                        relation,
                        operation: Box::new(operation),
                    }
                }));
                true
            }
        }
    }
}

fn apply_method(method: Method, raw: &str) -> Option<Operation> {
    match method {
        Method::Identifier(column) => Some(primitives::identifier(column, raw)),
        Method::Date(column) => Some(primitives::range(column, RangeKind::Date, raw)),
        Method::Time(column) => Some(primitives::range(column, RangeKind::Time, raw)),
        Method::Money(column) => Some(primitives::range(column, RangeKind::Money, raw)),
        Method::Text(column) => Some(primitives::text(column, raw)),
        Method::Enum(column) => Some(primitives::enumeration(column, raw)),
        Method::Boolean(column) => primitives::boolean(column, raw),
        Method::Computed(field) => Some(Operation::Compute(field)),
        Method::Related(_) => None,
    }
}

/// Output of [`FilterSpec::translate`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub entity: EntityType,
    pub operations: Vec<Operation>,
    /// Recognised parameters only, in transport order. Cache keys are built from this.
    pub params: QueryParams,
}

impl TranslatedQuery {
    /// A query carrying no operations and no parameters.
    pub fn empty(entity: EntityType) -> Self {
        Self {
            entity,
            operations: Vec::new(),
            params: QueryParams::new(),
        }
    }

    pub fn spec(&self) -> &'static FilterSpec {
        spec_for(self.entity)
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_predicate())
    }

    pub fn sorts(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Sort { column, direction } => Some((column.as_str(), *direction)),
            _ => None,
        })
    }

    pub fn includes(&self) -> impl Iterator<Item = &IncludeDirective> {
        self.operations.iter().flat_map(|op| match op {
            Operation::Include(directives) => directives.as_slice(),
            _ => &[],
        })
    }

    pub fn include(&self, relation: &str) -> Option<&IncludeDirective> {
        self.includes().find(|directive| directive.relation == relation)
    }

    pub fn include_counts(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().flat_map(|op| match op {
            Operation::IncludeCount(relations) => relations.as_slice(),
            _ => &[],
        })
        .map(String::as_str)
    }

    pub fn computes(&self, field: ComputedField) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, Operation::Compute(f) if *f == field))
    }

    /// Other entity types whose rows shape this result.
    ///
    /// Cached results carry these as extra tags so writes to related data
    /// still evict them.
    pub fn dependencies(&self) -> BTreeSet<EntityType> {
        let spec = self.spec();
        let mut dependencies = BTreeSet::new();
        for op in &self.operations {
            match op {
                Operation::Related { relation, .. } => {
                    dependencies.insert(relation.entity());
                }
                Operation::Include(directives) => {
                    for directive in directives {
                        if let Some(sources) = spec.relation_sources(&directive.relation) {
                            dependencies.extend(sources.iter().copied());
                        }
                    }
                }
                Operation::IncludeCount(relations) => {
                    for relation in relations {
                        if let Some(sources) = spec.relation_sources(relation) {
                            dependencies.extend(sources.iter().copied());
                        }
                    }
                }
                Operation::Compute(field) => dependencies.extend(field.sources().iter().copied()),
                _ => {}
            }
        }
        dependencies.remove(&self.entity);
        dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(entity: EntityType, query: &str) -> TranslatedQuery {
        spec_for(entity).translate(&QueryParams::parse(query))
    }

    #[test]
    fn time_frame_scenario_yields_ordered_operations() {
        let translated = translate(
            EntityType::TimeFrame,
            "filter[status]=!canceled&sort=-startDate,name&include=timeEntries",
        );
        assert_eq!(
            translated.operations,
            vec![
                Operation::Enum {
                    column: "status",
                    value: "canceled".into(),
                    negated: true,
                },
                Operation::Sort {
                    column: "start_date".into(),
                    direction: SortDirection::Desc,
                },
                Operation::Sort {
                    column: "name".into(),
                    direction: SortDirection::Asc,
                },
                Operation::Include(vec![IncludeDirective {
                    relation: "timeEntries".into(),
                    fields: Vec::new(),
                }]),
            ]
        );
    }

    #[test]
    fn unknown_keys_leave_no_trace() {
        let with_noise = translate(
            EntityType::TimeFrame,
            "utm_source=mail&filter[status]=done&filter[colour]=red&tab=2",
        );
        let clean = translate(EntityType::TimeFrame, "filter[status]=done");
        assert_eq!(with_noise, clean);
    }

    #[test]
    fn top_level_method_names_apply_directly() {
        let translated = translate(EntityType::TimeEntry, "billable=yes&description=*call*");
        assert_eq!(translated.operations.len(), 2);
        assert!(matches!(
            translated.operations[0],
            Operation::Boolean { value: true, negated: false, .. }
        ));
    }

    #[test]
    fn unparseable_boolean_is_recognised_but_inert() {
        let translated = translate(EntityType::TimeEntry, "filter[billable]=perhaps");
        assert!(translated.operations.is_empty());
        assert_eq!(translated.params.nested("filter", "billable"), Some("perhaps"));
    }

    #[test]
    fn add_only_invokes_computed_methods() {
        let translated = translate(EntityType::TimeFrame, "add=totalBillableSeconds,status,bogus");
        assert_eq!(
            translated.operations,
            vec![Operation::Compute(ComputedField::TotalBillableSeconds)]
        );
        assert!(translated.computes(ComputedField::TotalBillableSeconds));
    }

    #[test]
    fn relation_qualified_filters_delegate_to_the_related_spec() {
        let translated = translate(
            EntityType::TimeFrame,
            "filter[project:name]=acme*&filter[project:nope]=x",
        );
        assert_eq!(
            translated.operations,
            vec![Operation::Related {
                relation: Relation::Project,
                operation: Box::new(Operation::Text {
                    column: "name",
                    pattern: "acme%".into(),
                    negated: false,
                }),
            }]
        );
        assert_eq!(translated.params.nested("filter", "project:nope"), None);
    }

    #[test]
    fn relation_qualified_keys_only_resolve_inside_filter() {
        let translated = translate(EntityType::TimeFrame, "project:name=acme*&name=March");
        assert_eq!(
            translated.operations,
            vec![Operation::Text {
                column: "name",
                pattern: "March".into(),
                negated: false,
            }]
        );
        assert!(translated.params.get("project:name").is_none());
    }

    #[test]
    fn page_parameters_are_kept_for_cache_identity() {
        let translated = translate(EntityType::Project, "page[number]=2&page[size]=10");
        assert!(translated.operations.is_empty());
        assert_eq!(translated.params.nested("page", "number"), Some("2"));
    }

    #[test]
    fn dependencies_follow_includes_counts_and_aggregates() {
        let translated = translate(
            EntityType::Project,
            "includeCount=timeFrames&add=timeEntriesCount",
        );
        let dependencies: Vec<EntityType> = translated.dependencies().into_iter().collect();
        assert_eq!(dependencies, [EntityType::TimeFrame, EntityType::TimeEntry]);

        let plain = translate(EntityType::Project, "filter[name]=acme");
        assert!(plain.dependencies().is_empty());
    }
}
