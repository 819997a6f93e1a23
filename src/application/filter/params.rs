//! Request parameter map consumed by the translator.
//!
//! Entries keep the order the transport reported them in. Bracketed keys such
//! as `filter[status]` collapse into a nested map under `filter`.

use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    Nested(Vec<(String, String)>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(value) => Some(value),
            ParamValue::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&[(String, String)]> {
        match self {
            ParamValue::Scalar(_) => None,
            ParamValue::Nested(entries) => Some(entries),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-decoded `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.push_pair(key.as_ref(), value.into());
        }
        params
    }

    /// Decode a raw `application/x-www-form-urlencoded` query string.
    pub fn parse(query: &str) -> Self {
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    fn push_pair(&mut self, key: &str, value: String) {
        match split_bracketed(key) {
            Some((outer, inner)) => self.insert_nested(outer, inner, value),
            None => self.insert(key, ParamValue::Scalar(value)),
        }
    }

    /// Insert or replace a top-level entry. A replaced entry keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn insert_scalar(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, ParamValue::Scalar(value.into()));
    }

    /// Insert one `outer[inner]` value. An empty `inner` appends with the next index.
    pub fn insert_nested(&mut self, outer: &str, inner: &str, value: impl Into<String>) {
        let value = value.into();
        let index = match self.entries.iter().position(|(key, _)| key == outer) {
            Some(index) => index,
            None => {
                self.entries
                    .push((outer.to_string(), ParamValue::Nested(Vec::new())));
                self.entries.len() - 1
            }
        };

        let slot = &mut self.entries[index].1;
        if !matches!(slot, ParamValue::Nested(_)) {
            *slot = ParamValue::Nested(Vec::new());
        }
        let ParamValue::Nested(nested) = slot else {
            return;
        };

        let inner = if inner.is_empty() {
            nested.len().to_string()
        } else {
            inner.to_string()
        };
        match nested.iter_mut().find(|(key, _)| *key == inner) {
            Some((_, slot)) => *slot = value,
            None => nested.push((inner, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_scalar)
    }

    pub fn nested(&self, key: &str, inner: &str) -> Option<&str> {
        self.get(key)
            .and_then(ParamValue::as_nested)
            .and_then(|entries| entries.iter().find(|(k, _)| k == inner))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URL-encoded form with top-level keys sorted; nested maps keep their order.
    ///
    /// Spaces become `+` and every byte outside `[A-Za-z0-9._-]` is
    /// percent-encoded, so hashes of this string stay stable across deployments.
    pub fn canonical_query_string(&self) -> String {
        let mut sorted: Vec<&(String, ParamValue)> = self.entries.iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut parts = Vec::with_capacity(sorted.len());
        for (key, value) in sorted {
            match value {
                ParamValue::Scalar(value) => {
                    parts.push(format!("{}={}", encode_component(key), encode_component(value)));
                }
                ParamValue::Nested(entries) => {
                    for (inner, value) in entries {
                        parts.push(format!(
                            "{}={}",
                            encode_component(&format!("{key}[{inner}]")),
                            encode_component(value)
                        ));
                    }
                }
            }
        }

        parts.join("&")
    }
}

fn split_bracketed(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    if open == 0 {
        return None;
    }
    let close = open + key[open..].find(']')?;
    Some((&key[..open], &key[open + 1..close]))
}

fn encode_component(value: &str) -> String {
    // form_urlencoded leaves `*` bare.
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_keys_become_nested_maps() {
        let params = QueryParams::parse("filter%5Bstatus%5D=%21canceled&filter[name]=a*&sort=name");
        assert_eq!(params.nested("filter", "status"), Some("!canceled"));
        assert_eq!(params.nested("filter", "name"), Some("a*"));
        assert_eq!(params.scalar("sort"), Some("name"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn transport_order_is_preserved() {
        let params = QueryParams::parse("sort=name&include=project&add=totalBillableSeconds");
        let keys: Vec<&str> = params.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["sort", "include", "add"]);
    }

    #[test]
    fn repeated_key_overwrites_in_place() {
        let params = QueryParams::parse("sort=name&include=project&sort=-name");
        let keys: Vec<&str> = params.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["sort", "include"]);
        assert_eq!(params.scalar("sort"), Some("-name"));
    }

    #[test]
    fn empty_brackets_append_indices() {
        let params = QueryParams::parse("ids[]=a&ids[]=b");
        assert_eq!(params.nested("ids", "0"), Some("a"));
        assert_eq!(params.nested("ids", "1"), Some("b"));
    }

    #[test]
    fn canonical_form_sorts_top_level_keys() {
        let params = QueryParams::from_pairs([
            ("sort", "-startDate,name"),
            ("filter[status]", "!canceled"),
            ("include", "timeEntries"),
        ]);
        assert_eq!(
            params.canonical_query_string(),
            "filter%5Bstatus%5D=%21canceled&include=timeEntries&sort=-startDate%2Cname"
        );
    }

    #[test]
    fn canonical_form_escapes_reserved_bytes() {
        let params = QueryParams::from_pairs([("filter[name]", "*foo bar*")]);
        assert_eq!(
            params.canonical_query_string(),
            "filter%5Bname%5D=%2Afoo+bar%2A"
        );
    }

    #[test]
    fn canonical_form_of_empty_map_is_empty() {
        assert_eq!(QueryParams::new().canonical_query_string(), "");
    }
}
