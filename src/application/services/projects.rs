use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{QueryCache, validation};
use crate::application::error::ServiceError;
use crate::application::filter::{QueryParams, TranslatedQuery, spec_for};
use crate::application::pagination::{PageLimits, PageRequest, Paginated};
use crate::application::repos::{
    CreateProjectParams, ProjectLookup, ProjectsRepo, ProjectsWriteRepo, UpdateProjectParams,
};
use crate::cache::WriteAction;
use crate::domain::entities::ProjectRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};
use crate::domain::types::EntityType;

const ENTITY: EntityType = EntityType::Project;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub additional_properties: Option<Value>,
}

#[derive(Clone)]
pub struct ProjectService {
    reader: Arc<dyn ProjectsRepo>,
    writer: Arc<dyn ProjectsWriteRepo>,
    cache: QueryCache,
    limits: PageLimits,
}

impl ProjectService {
    pub fn new(
        reader: Arc<dyn ProjectsRepo>,
        writer: Arc<dyn ProjectsWriteRepo>,
        cache: QueryCache,
        limits: PageLimits,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            limits,
        }
    }

    pub async fn list(&self, params: &QueryParams) -> Result<Paginated<ProjectRecord>, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        let page = PageRequest::from_params(&query.params, self.limits);
        self.cache
            .collection(&query, || async {
                Ok(self.reader.list_projects(&query, page).await?)
            })
            .await
    }

    /// `id` is either a uuid or a slug.
    pub async fn get(&self, id: &str, params: &QueryParams) -> Result<ProjectRecord, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        self.cache
            .record(&query, id, || self.find(id, &query))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ProjectRecord, ServiceError> {
        let query = TranslatedQuery::empty(ENTITY);
        self.cache
            .record_by_id(ENTITY, id, || self.find(id, &query))
            .await
    }

    pub async fn create(&self, input: ProjectInput) -> Result<ProjectRecord, ServiceError> {
        let name = validation::required_text("name", input.name)?;
        let description = validation::optional_text(input.description);
        let additional_properties =
            validation::properties_object("additional_properties", input.additional_properties)?;
        let slug = self.unique_slug(&name).await?;

        let pending = self.cache.begin(ENTITY, WriteAction::Create);
        let project = self
            .writer
            .create_project(CreateProjectParams {
                name,
                slug,
                description,
                additional_properties: Value::Object(additional_properties),
            })
            .await?;
        pending.commit(project.id).await;

        info!(project_id = %project.id, slug = %project.slug, "Project created");
        Ok(project)
    }

    /// The slug is fixed at creation and survives renames.
    pub async fn update(&self, id: &str, input: ProjectInput) -> Result<ProjectRecord, ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;

        let name = validation::required_text("name", input.name)?;
        let description = validation::optional_text(input.description);
        let additional_properties = match input.additional_properties {
            Some(value) => {
                Value::Object(validation::properties_object("additional_properties", Some(value))?)
            }
            None => existing.additional_properties.clone(),
        };

        let pending = self.cache.begin(ENTITY, WriteAction::Update);
        let project = self
            .writer
            .update_project(UpdateProjectParams {
                id: existing.id,
                name,
                slug: existing.slug,
                description,
                additional_properties,
            })
            .await?;
        pending.commit(project.id).await;

        info!(project_id = %project.id, "Project updated");
        Ok(project)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;

        let pending = self.cache.begin(ENTITY, WriteAction::Delete);
        self.writer.delete_project(existing.id).await?;
        pending.commit(existing.id).await;

        info!(project_id = %existing.id, "Project deleted");
        Ok(())
    }

    async fn find(&self, id: &str, query: &TranslatedQuery) -> Result<ProjectRecord, ServiceError> {
        self.reader
            .find_project(&ProjectLookup::parse(id), query)
            .await?
            .ok_or_else(|| DomainError::not_found(ENTITY, id).into())
    }

    async fn unique_slug(&self, name: &str) -> Result<String, ServiceError> {
        let reader = self.reader.clone();
        match generate_unique_slug_async(name, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                reader
                    .slug_exists(&candidate, None::<Uuid>)
                    .await
                    .map(|exists| !exists)
            }
        })
        .await
        {
            Ok(slug) => Ok(slug),
            Err(SlugAsyncError::Slug(SlugError::Exhausted { .. })) => Err(
                DomainError::invalid_field("slug", "no unique slug could be derived").into(),
            ),
            Err(SlugAsyncError::Slug(err)) => {
                Err(DomainError::invalid_field("name", err.to_string()).into())
            }
            Err(SlugAsyncError::Predicate(err)) => Err(err.into()),
        }
    }
}
