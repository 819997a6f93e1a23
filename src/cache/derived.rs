//! Named cache region for figures derived from a time frame.
//!
//! Kept apart from the query cache key space: keys are
//! `derived:timeFrame:{id}:{variant}` and every entry is tagged with the
//! entity types the figures read from.

use std::future::Future;
use std::sync::Arc;

use super::keys::record_tag;
use super::memoizer::{Memoizer, Ttl};
use crate::domain::entities::{PreferenceRecord, TimeFrameRecord};
use crate::domain::time_frames::{BillingRate, TimeFrameMetrics};
use crate::domain::types::EntityType;

const REGION_PREFIX: &str = "derived";
const TIME_FRAME_REGION: &str = "timeFrame";
const TIME_FRAME_SOURCES: [EntityType; 3] = [
    EntityType::TimeFrame,
    EntityType::TimeEntry,
    EntityType::Preference,
];

/// Which relations were loaded on the frame the figures were computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedVariant {
    /// Entries loaded; every figure is available.
    Full,
    /// Only the billable aggregate was loaded.
    Billable,
    Bare,
}

impl DerivedVariant {
    pub fn of(frame: &TimeFrameRecord) -> Self {
        if frame.time_entries.is_some() {
            DerivedVariant::Full
        } else if frame.total_billable_seconds.is_some() {
            DerivedVariant::Billable
        } else {
            DerivedVariant::Bare
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DerivedVariant::Full => "full",
            DerivedVariant::Billable => "billable",
            DerivedVariant::Bare => "bare",
        }
    }
}

pub struct DerivedRegion {
    memoizer: Arc<Memoizer>,
    ttl: Ttl,
}

impl DerivedRegion {
    pub fn new(memoizer: Arc<Memoizer>, ttl: Ttl) -> Self {
        Self { memoizer, ttl }
    }

    pub fn time_frame_key(frame: &TimeFrameRecord) -> String {
        format!(
            "{REGION_PREFIX}:{TIME_FRAME_REGION}:{}:{}",
            frame.id,
            DerivedVariant::of(frame).as_str()
        )
    }

    pub fn time_frame_tags(frame: &TimeFrameRecord) -> Vec<String> {
        let mut tags: Vec<String> = TIME_FRAME_SOURCES
            .iter()
            .map(|entity| entity.as_str().to_string())
            .collect();
        tags.push(record_tag(EntityType::TimeFrame, &frame.id.to_string()));
        tags
    }

    /// Figures for `frame`, computed at most once per variant until a
    /// write to any source entity flushes them.
    ///
    /// `preference` is only awaited when the frame carries no rate of its own.
    pub async fn time_frame_metrics<F, Fut, E>(
        &self,
        frame: &TimeFrameRecord,
        preference: F,
    ) -> Result<TimeFrameMetrics, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<PreferenceRecord>, E>>,
    {
        let key = Self::time_frame_key(frame);
        let tags = Self::time_frame_tags(frame);

        self.memoizer
            .remember(&key, &tags, self.ttl, || async move {
                let rate = match BillingRate::resolve(frame, None) {
                    Some(rate) => Some(rate),
                    None => BillingRate::resolve(frame, preference().await?.as_ref()),
                };
                Ok(TimeFrameMetrics::compute(frame, rate.as_ref()))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use time::macros::{date, datetime};
    use uuid::Uuid;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::MemoryTagStore;
    use crate::domain::types::{TimeFrameStatus, WeekStart};

    fn frame() -> TimeFrameRecord {
        TimeFrameRecord {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            start_date: date!(2024 - 03 - 01),
            end_date: date!(2024 - 03 - 11),
            name: None,
            status: TimeFrameStatus::InProgress,
            notes: None,
            hourly_rate: None,
            currency: None,
            created_at: datetime!(2024-03-01 00:00 UTC),
            updated_at: datetime!(2024-03-01 00:00 UTC),
            total_billable_seconds: Some(7200.0),
            time_entries_count: None,
            time_entries: None,
            project: None,
        }
    }

    fn preference() -> PreferenceRecord {
        PreferenceRecord {
            id: Uuid::nil(),
            hourly_rate: 4000,
            currency: "EUR".to_string(),
            week_start: WeekStart::Monday,
            additional_properties: serde_json::json!({}),
            created_at: datetime!(2024-03-01 00:00 UTC),
            updated_at: datetime!(2024-03-01 00:00 UTC),
        }
    }

    fn region() -> (DerivedRegion, Arc<Memoizer>) {
        let config = CacheConfig::default();
        let memoizer = Arc::new(Memoizer::new(
            Arc::new(MemoryTagStore::new(&config)),
            &config,
        ));
        (
            DerivedRegion::new(memoizer.clone(), config.derived_ttl()),
            memoizer,
        )
    }

    #[test]
    fn keys_live_in_their_own_namespace() {
        let mut frame = frame();
        assert_eq!(
            DerivedRegion::time_frame_key(&frame),
            format!("derived:timeFrame:{}:billable", Uuid::nil())
        );
        frame.time_entries = Some(Vec::new());
        assert!(DerivedRegion::time_frame_key(&frame).ends_with(":full"));
        frame.time_entries = None;
        frame.total_billable_seconds = None;
        assert!(DerivedRegion::time_frame_key(&frame).ends_with(":bare"));
    }

    #[test]
    fn tags_cover_every_source_entity() {
        let tags = DerivedRegion::time_frame_tags(&frame());
        for tag in ["TimeFrame", "TimeEntry", "Preference"] {
            assert!(tags.iter().any(|t| t == tag), "missing {tag}");
        }
    }

    #[tokio::test]
    async fn falls_back_to_preference_rate_and_caches() {
        let (region, _) = region();
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            let metrics = region
                .time_frame_metrics(&frame(), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Some(preference()))
                })
                .await
                .unwrap();
            assert_eq!(metrics.total_billable.as_deref(), Some("EUR 80.00"));
            assert_eq!(metrics.period_duration_in_days, 10);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn preference_write_evicts_derived_figures() {
        let (region, memoizer) = region();
        let loads = AtomicUsize::new(0);
        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(Some(preference()))
        };

        region.time_frame_metrics(&frame(), load).await.unwrap();
        memoizer.flush(&["Preference".to_string()]).await;
        region.time_frame_metrics(&frame(), load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn own_rate_skips_preference_lookup() {
        let (region, _) = region();
        let mut frame = frame();
        frame.hourly_rate = Some(10000);
        frame.currency = Some("USD".to_string());

        let loads = AtomicUsize::new(0);

        let metrics = region
            .time_frame_metrics(&frame, || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Some(preference()))
            })
            .await
            .unwrap();
        assert_eq!(metrics.total_billable.as_deref(), Some("USD 200.00"));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }
}
