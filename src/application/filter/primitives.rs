//! Value-typed filter building blocks shared by every entity.
//!
//! None of these validate the raw value. A malformed date or number travels
//! through to the storage layer and fails there.

use super::operation::{
    IncludeDirective, Operation, RangeBound, RangeKind, SortDirection,
};

const NEGATION: char = '!';
const LIST_SEPARATOR: char = ',';
/// Stands in for `,` inside a single `include` token.
const INCLUDE_FIELD_SEPARATOR: char = ';';

fn strip_negation(raw: &str) -> (&str, bool) {
    match raw.strip_prefix(NEGATION) {
        Some(rest) => (rest, true),
        None => (raw, false),
    }
}

/// Split a comma-separated list, dropping empty tokens.
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(LIST_SEPARATOR).filter(|token| !token.is_empty())
}

/// `a` / `!a` / `a,b` / `!a,b`. A leading `!` negates the whole list.
pub fn identifier(column: &'static str, raw: &str) -> Operation {
    let (body, negated) = strip_negation(raw);
    let values = body.split(LIST_SEPARATOR).map(str::to_string).collect();
    Operation::Identifier {
        column,
        values,
        negated,
    }
}

/// `>v`, `<v`, `v`, or `from,to` (inclusive).
pub fn range(column: &'static str, kind: RangeKind, raw: &str) -> Operation {
    let parts: Vec<&str> = raw.split(LIST_SEPARATOR).collect();
    let bound = if parts.len() >= 2 {
        RangeBound::Between(parts[0].to_string(), parts[1].to_string())
    } else {
        let value: String = raw.chars().filter(|c| !matches!(c, '<' | '>')).collect();
        match raw.chars().next() {
            Some('>') => RangeBound::After(value),
            Some('<') => RangeBound::Before(value),
            _ => RangeBound::Exact(raw.to_string()),
        }
    };

    Operation::Range {
        column,
        kind,
        bound,
    }
}

/// Case-insensitive match where `*` is a wildcard.
pub fn text(column: &'static str, raw: &str) -> Operation {
    let (body, negated) = strip_negation(raw);
    Operation::Text {
        column,
        pattern: body.replace('*', "%"),
        negated,
    }
}

pub fn enumeration(column: &'static str, raw: &str) -> Operation {
    let (body, negated) = strip_negation(raw);
    Operation::Enum {
        column,
        value: body.to_string(),
        negated,
    }
}

/// Unparseable values yield no operation at all.
pub fn boolean(column: &'static str, raw: &str) -> Option<Operation> {
    let (body, negated) = strip_negation(raw);
    parse_bool(body).map(|value| Operation::Boolean {
        column,
        value,
        negated,
    })
}

/// Permissive boolean coercion: `1/true/on/yes` and `0/false/off/no/""`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Tokens starting with `_` are client-side sort keys and never reach storage.
pub fn sort(raw: &str, sortable: &[(&'static str, &'static str)]) -> Vec<Operation> {
    split_list(raw)
        .filter(|token| !token.starts_with('_'))
        .filter_map(|token| {
            let (name, direction) = match token.strip_prefix('-') {
                Some(name) => (name, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if name.is_empty() {
                return None;
            }
            let column = sortable
                .iter()
                .find(|(param, _)| *param == name)
                .map(|(_, column)| *column)
                .unwrap_or(name);
            Some(Operation::Sort {
                column: column.to_string(),
                direction,
            })
        })
        .collect()
}

/// Decode an `include` value such as `timeEntries,project:id;name`.
pub fn decode_include(raw: &str) -> Vec<IncludeDirective> {
    split_list(raw)
        .map(|token| token.replace(INCLUDE_FIELD_SEPARATOR, ","))
        .map(|token| match token.split_once(':') {
            Some((relation, fields)) => IncludeDirective {
                relation: relation.to_string(),
                fields: split_list(fields).map(str::to_string).collect(),
            },
            None => IncludeDirective {
                relation: token,
                fields: Vec::new(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_list_negation_covers_every_value() {
        assert_eq!(
            identifier("id", "!a,b"),
            Operation::Identifier {
                column: "id",
                values: vec!["a".into(), "b".into()],
                negated: true,
            }
        );
        assert_eq!(
            identifier("id", "2"),
            Operation::Identifier {
                column: "id",
                values: vec!["2".into()],
                negated: false,
            }
        );
    }

    #[test]
    fn range_prefixes_open_the_interval() {
        let after = range("amount", RangeKind::Money, ">10");
        assert_eq!(
            after,
            Operation::Range {
                column: "amount",
                kind: RangeKind::Money,
                bound: RangeBound::After("10".into()),
            }
        );
        let before = range("work_day", RangeKind::Date, "<2024-02-01");
        assert!(matches!(
            before,
            Operation::Range { bound: RangeBound::Before(ref v), .. } if v == "2024-02-01"
        ));
    }

    #[test]
    fn range_pair_is_between_and_extra_values_are_ignored() {
        let between = range("start_date", RangeKind::Date, "2024-01-01,2024-01-31,2024-03-01");
        assert!(matches!(
            between,
            Operation::Range { bound: RangeBound::Between(ref a, ref b), .. }
                if a == "2024-01-01" && b == "2024-01-31"
        ));
    }

    #[test]
    fn range_without_prefix_is_exact() {
        assert!(matches!(
            range("start_time", RangeKind::Time, "09:00"),
            Operation::Range { bound: RangeBound::Exact(ref v), .. } if v == "09:00"
        ));
    }

    #[test]
    fn text_translates_wildcards() {
        assert_eq!(
            text("name", "!*foo*"),
            Operation::Text {
                column: "name",
                pattern: "%foo%".into(),
                negated: true,
            }
        );
    }

    #[test]
    fn boolean_coercion_is_permissive() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert!(boolean("billable", "maybe").is_none());
        assert_eq!(
            boolean("billable", "!true"),
            Some(Operation::Boolean {
                column: "billable",
                value: true,
                negated: true,
            })
        );
    }

    #[test]
    fn sort_maps_columns_and_skips_virtual_keys() {
        let sortable = [("startDate", "start_date"), ("name", "name")];
        let ops = sort("-startDate,_virtual,name,unknownCol,", &sortable);
        assert_eq!(
            ops,
            vec![
                Operation::Sort {
                    column: "start_date".into(),
                    direction: SortDirection::Desc,
                },
                Operation::Sort {
                    column: "name".into(),
                    direction: SortDirection::Asc,
                },
                Operation::Sort {
                    column: "unknownCol".into(),
                    direction: SortDirection::Asc,
                },
            ]
        );
    }

    #[test]
    fn include_decodes_field_restrictions() {
        let directives = decode_include("timeEntries,project:id;name;slug");
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].relation, "timeEntries");
        assert!(directives[0].fields.is_empty());
        assert_eq!(directives[1].relation, "project");
        assert_eq!(directives[1].fields, ["id", "name", "slug"]);
        assert_eq!(directives[1].to_string(), "project:id,name,slug");
    }
}
