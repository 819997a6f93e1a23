use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{QueryCache, validation};
use crate::application::error::ServiceError;
use crate::application::filter::{QueryParams, TranslatedQuery, spec_for};
use crate::application::pagination::PageRequest;
use crate::application::repos::{PreferencesRepo, PreferencesWriteRepo, UpsertPreferenceParams};
use crate::cache::{GLOBAL_PREFERENCES_KEY, Ttl, WriteAction};
use crate::domain::entities::PreferenceRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{EntityType, WeekStart};

const ENTITY: EntityType = EntityType::Preference;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceInput {
    /// Major currency units.
    pub hourly_rate: Option<f64>,
    pub currency: Option<String>,
    pub week_start: Option<String>,
    pub additional_properties: Option<Value>,
}

impl PreferenceInput {
    fn validate(self) -> Result<UpsertPreferenceParams, DomainError> {
        let hourly_rate = validation::rate_in_cents(
            "hourly_rate",
            validation::required("hourly_rate", self.hourly_rate)?,
        )?;
        let currency = validation::currency("currency", self.currency)?;
        let week_start = validation::required("week_start", validation::optional_text(self.week_start))?
            .parse::<WeekStart>()
            .map_err(|_| {
                DomainError::invalid_field("week_start", "must be a day of the week")
            })?;
        let properties = validation::properties_object(
            "additional_properties",
            Some(validation::required(
                "additional_properties",
                self.additional_properties,
            )?),
        )?;
        validation::preference_properties(&properties)?;

        Ok(UpsertPreferenceParams {
            hourly_rate,
            currency,
            week_start,
            additional_properties: Value::Object(properties),
        })
    }
}

/// The global preference record. Its writes reach every content cache entry.
#[derive(Clone)]
pub struct PreferenceService {
    reader: Arc<dyn PreferencesRepo>,
    writer: Arc<dyn PreferencesWriteRepo>,
    cache: QueryCache,
    global_ttl: Ttl,
}

impl PreferenceService {
    pub fn new(
        reader: Arc<dyn PreferencesRepo>,
        writer: Arc<dyn PreferencesWriteRepo>,
        cache: QueryCache,
        global_ttl: Ttl,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            global_ttl,
        }
    }

    /// First record matching `params`; there is a single preference per installation.
    pub async fn current(&self, params: &QueryParams) -> Result<PreferenceRecord, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        self.cache
            .collection(&query, || async {
                self.reader
                    .list_preferences(&query, PageRequest::new(1, 1))
                    .await?
                    .data
                    .into_iter()
                    .next()
                    .ok_or_else(|| DomainError::not_found(ENTITY, "current").into())
            })
            .await
    }

    /// Unfiltered singleton used to price time frames, cached under its own key.
    pub async fn global(&self) -> Result<Option<PreferenceRecord>, ServiceError> {
        let tags = [ENTITY.as_str().to_string()];
        self.cache
            .memoizer()
            .remember(GLOBAL_PREFERENCES_KEY, &tags, self.global_ttl, || async {
                Ok(self.reader.first_preference().await?)
            })
            .await
    }

    pub async fn get(&self, id: &str, params: &QueryParams) -> Result<PreferenceRecord, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        self.cache
            .record(&query, id, || self.find(id, &query))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<PreferenceRecord, ServiceError> {
        let query = TranslatedQuery::empty(ENTITY);
        self.cache
            .record_by_id(ENTITY, id, || self.find(id, &query))
            .await
    }

    pub async fn create(&self, input: PreferenceInput) -> Result<PreferenceRecord, ServiceError> {
        let params = input.validate()?;

        let pending = self.cache.begin(ENTITY, WriteAction::Create);
        let preference = self.writer.create_preference(params).await?;
        pending.commit(preference.id).await;

        info!(preference_id = %preference.id, "Preference created");
        Ok(preference)
    }

    /// Replaces every field, `additional_properties` included.
    pub async fn update(
        &self,
        id: &str,
        input: PreferenceInput,
    ) -> Result<PreferenceRecord, ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;
        let params = input.validate()?;

        let pending = self.cache.begin(ENTITY, WriteAction::Update);
        let preference = self.writer.update_preference(existing.id, params).await?;
        pending.commit(preference.id).await;

        info!(preference_id = %preference.id, "Preference updated");
        Ok(preference)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;

        let pending = self.cache.begin(ENTITY, WriteAction::Delete);
        self.writer.delete_preference(existing.id).await?;
        pending.commit(existing.id).await;

        info!(preference_id = %existing.id, "Preference deleted");
        Ok(())
    }

    async fn find(&self, id: &str, query: &TranslatedQuery) -> Result<PreferenceRecord, ServiceError> {
        let not_found = || ServiceError::from(DomainError::not_found(ENTITY, id));
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.reader
            .find_preference(uuid, query)
            .await?
            .ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::pagination::PageLimits;
    use crate::testing::{MemoryRepos, cache};
    use crate::application::services::{ProjectInput, ProjectService};

    fn input() -> PreferenceInput {
        PreferenceInput {
            hourly_rate: Some(65.0),
            currency: Some("EUR".into()),
            week_start: Some("Monday".into()),
            additional_properties: Some(json!({"roundMethod": "up"})),
        }
    }

    #[tokio::test]
    async fn create_stores_rate_in_cents() {
        let repos = Arc::new(MemoryRepos::default());
        let service = PreferenceService::new(repos.clone(), repos.clone(), cache(), Ttl::Forever);

        let preference = service.create(input()).await.unwrap();
        assert_eq!(preference.hourly_rate, 6500);
        assert_eq!(preference.week_start, WeekStart::Monday);
    }

    #[tokio::test]
    async fn invalid_properties_are_rejected() {
        let repos = Arc::new(MemoryRepos::default());
        let service = PreferenceService::new(repos.clone(), repos.clone(), cache(), Ttl::Forever);

        let bad_colour = PreferenceInput {
            additional_properties: Some(json!({"invoicePrimaryColor": "teal"})),
            ..input()
        };
        assert!(service.create(bad_colour).await.unwrap_err().is_validation());

        let bad_day = PreferenceInput {
            week_start: Some("someday".into()),
            ..input()
        };
        assert!(service.create(bad_day).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn current_reports_missing_singleton() {
        let repos = Arc::new(MemoryRepos::default());
        let service = PreferenceService::new(repos.clone(), repos.clone(), cache(), Ttl::Forever);

        let err = service.current(&QueryParams::new()).await.unwrap_err();
        assert!(err.is_not_found());

        service.create(input()).await.unwrap();
        assert_eq!(service.current(&QueryParams::new()).await.unwrap().currency, "EUR");
    }

    #[tokio::test]
    async fn global_is_cached_until_a_preference_write() {
        let repos = Arc::new(MemoryRepos::default());
        let service = PreferenceService::new(repos.clone(), repos.clone(), cache(), Ttl::Forever);
        let created = service.create(input()).await.unwrap();

        service.global().await.unwrap();
        service.global().await.unwrap();
        assert_eq!(repos.find_calls(), 1);

        let updated = service
            .update(
                &created.id.to_string(),
                PreferenceInput {
                    hourly_rate: Some(90.0),
                    ..input()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.hourly_rate, 9000);
        assert_eq!(service.global().await.unwrap().unwrap().hourly_rate, 9000);
    }

    #[tokio::test]
    async fn preference_write_evicts_content_entries() {
        let repos = Arc::new(MemoryRepos::default());
        let shared = cache();
        let preferences =
            PreferenceService::new(repos.clone(), repos.clone(), shared.clone(), Ttl::Forever);
        let projects =
            ProjectService::new(repos.clone(), repos.clone(), shared, PageLimits::default());
        projects
            .create(ProjectInput {
                name: Some("Acme".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        projects.list(&QueryParams::new()).await.unwrap();
        projects.list(&QueryParams::new()).await.unwrap();
        assert_eq!(repos.list_calls(), 1);

        preferences.create(input()).await.unwrap();
        projects.list(&QueryParams::new()).await.unwrap();
        assert_eq!(repos.list_calls(), 2);
    }
}
