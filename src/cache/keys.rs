//! Cache keys and invalidation tags.
//!
//! Key shapes are kept bit-compatible with caches populated by earlier
//! deployments: `{Types}:{md5}` for collections and `{Type}:{id}[:{md5}]`
//! for single records, where the hash covers the canonical query string.

use md5::{Digest, Md5};

use crate::application::filter::QueryParams;
use crate::domain::types::EntityType;

/// Key under which the singleton preference record is cached.
pub const GLOBAL_PREFERENCES_KEY: &str = "global_preferences";

/// Entities whose writes reach into derived fields of other entities.
pub const GLOBAL_ENTITIES: [EntityType; 1] = [EntityType::Preference];

pub const CONTENT_ENTITIES: [EntityType; 3] = [
    EntityType::Project,
    EntityType::TimeFrame,
    EntityType::TimeEntry,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Global,
    Content,
}

impl EntityClass {
    pub fn of(entity: EntityType) -> Self {
        if GLOBAL_ENTITIES.contains(&entity) {
            EntityClass::Global
        } else {
            EntityClass::Content
        }
    }
}

pub fn hex_md5(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// `{Types}:{md5(canonical query)}`
pub fn items_cache_key(entity: EntityType, params: &QueryParams) -> String {
    format!(
        "{}:{}",
        entity.plural(),
        hex_md5(&params.canonical_query_string())
    )
}

/// `{Type}:{id}`, suffixed with `:{md5}` whenever a parameter map is supplied,
/// even an empty one.
pub fn item_cache_key(entity: EntityType, id: &str, params: Option<&QueryParams>) -> String {
    match params {
        Some(params) => format!(
            "{}:{}:{}",
            entity.as_str(),
            id,
            hex_md5(&params.canonical_query_string())
        ),
        None => format!("{}:{}", entity.as_str(), id),
    }
}

pub fn record_tag(entity: EntityType, id: &str) -> String {
    format!("{}:{}", entity.as_str(), id)
}

/// `[Type, Types]`, plus `Type:id` for single-record fetches.
pub fn cache_tags(entity: EntityType, id: Option<&str>) -> Vec<String> {
    let mut tags = vec![entity.as_str().to_string(), entity.plural().to_string()];
    if let Some(id) = id {
        tags.push(record_tag(entity, id));
    }
    tags
}

/// Entity types whose tags a write to `entity` must flush.
///
/// A content write touches its own type only. A global write also reaches
/// every content type, since derived amounts read through it.
pub fn model_cache_tags(entity: EntityType) -> Vec<EntityType> {
    match EntityClass::of(entity) {
        EntityClass::Content => vec![entity],
        EntityClass::Global => {
            let mut entities = vec![entity];
            entities.extend(
                GLOBAL_ENTITIES
                    .iter()
                    .chain(CONTENT_ENTITIES.iter())
                    .copied()
                    .filter(|other| *other != entity),
            );
            entities
        }
    }
}
