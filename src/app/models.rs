use crate::app::mediator::{Handler, MediatorBuilder, Request};
use crate::app::{index_by_id, validation};
use crate::domain::Model;
use crate::error::{Result, ServiceError, ValidationErrors};
use crate::storage::Storage;
use crate::view_models::{CreateModelVm, ModelVm, RemoveResultVm};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct ListModelQuery;

pub struct ListModelsByIdsQuery {
    pub ids: Vec<i64>,
}

pub struct FindModelByIdQuery {
    pub id: i64,
}

pub struct ListModelByBrandIdQuery {
    pub brand_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateModelCommand {
    pub brand_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateModelCommand {
    pub id: i64,
    pub brand_id: i64,
    pub name: String,
}

pub struct RemoveModelCommand {
    pub id: i64,
}

impl Request for ListModelQuery {
    type Response = Vec<ModelVm>;
    const NAME: &'static str = "ListModelQuery";
}

impl Request for ListModelsByIdsQuery {
    type Response = Vec<ModelVm>;
    const NAME: &'static str = "ListModelsByIdsQuery";
}

impl Request for FindModelByIdQuery {
    type Response = Option<ModelVm>;
    const NAME: &'static str = "FindModelByIdQuery";
}

impl Request for ListModelByBrandIdQuery {
    type Response = Vec<ModelVm>;
    const NAME: &'static str = "ListModelByBrandIdQuery";
}

impl Request for CreateModelCommand {
    type Response = ModelVm;
    const NAME: &'static str = "CreateModelCommand";
}

impl Request for UpdateModelCommand {
    type Response = ModelVm;
    const NAME: &'static str = "UpdateModelCommand";
}

impl Request for RemoveModelCommand {
    type Response = RemoveResultVm;
    const NAME: &'static str = "RemoveModelCommand";
}

impl From<CreateModelVm> for CreateModelCommand {
    fn from(vm: CreateModelVm) -> Self {
        Self {
            brand_id: vm.brand_id,
            name: vm.name,
        }
    }
}

impl UpdateModelCommand {
    pub fn from_vm(id: i64, vm: CreateModelVm) -> Self {
        Self {
            id,
            brand_id: vm.brand_id,
            name: vm.name,
        }
    }
}

pub struct ModelHandler {
    storage: Arc<dyn Storage>,
}

impl ModelHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn to_view_models(&self, models: Vec<Model>) -> Result<Vec<ModelVm>> {
        let brand_ids: Vec<i64> = models.iter().map(|m| m.brand_id).collect();
        let brands = index_by_id(self.storage.get_brands_by_ids(&brand_ids).await?, |b| b.id);

        Ok(models
            .into_iter()
            .map(|model| ModelVm {
                id: model.id.unwrap_or_default(),
                brand_id: model.brand_id,
                brand_name: brands
                    .get(&model.brand_id)
                    .map(|b| b.name.clone())
                    .unwrap_or_default(),
                name: model.name,
            })
            .collect())
    }

    async fn to_view_model(&self, model: Model) -> Result<ModelVm> {
        let mut vms = self.to_view_models(vec![model]).await?;
        vms.pop().ok_or_else(|| ServiceError::Database {
            message: "model mapping produced no row".to_string(),
        })
    }

    /// Validate fields and references, then check the name is free within the brand
    async fn checked(&self, id: Option<i64>, brand_id: i64, name: &str) -> Result<Model> {
        let mut errors = ValidationErrors::new();
        let name = validation::required_name(&mut errors, "name", name);
        if self.storage.get_brand_by_id(brand_id).await?.is_none() {
            errors.add("brandId", format!("brand {brand_id} does not exist"));
        }
        errors.into_result()?;

        if let Some(existing) = self
            .storage
            .get_model_by_brand_and_name(brand_id, &name)
            .await?
        {
            if existing.id != id {
                return Err(ServiceError::Conflict(format!(
                    "model '{}' already exists for brand {}",
                    existing.name, brand_id
                )));
            }
        }

        Ok(Model { id, brand_id, name })
    }
}

pub fn register(builder: MediatorBuilder, storage: Arc<dyn Storage>) -> MediatorBuilder {
    let handler = Arc::new(ModelHandler::new(storage));
    builder
        .register::<ListModelQuery, _>(handler.clone())
        .register::<ListModelsByIdsQuery, _>(handler.clone())
        .register::<FindModelByIdQuery, _>(handler.clone())
        .register::<ListModelByBrandIdQuery, _>(handler.clone())
        .register::<CreateModelCommand, _>(handler.clone())
        .register::<UpdateModelCommand, _>(handler.clone())
        .register::<RemoveModelCommand, _>(handler)
}

#[async_trait]
impl Handler<ListModelQuery> for ModelHandler {
    async fn handle(&self, _query: ListModelQuery) -> Result<Vec<ModelVm>> {
        let models = self.storage.list_models().await?;
        self.to_view_models(models).await
    }
}

#[async_trait]
impl Handler<ListModelsByIdsQuery> for ModelHandler {
    async fn handle(&self, query: ListModelsByIdsQuery) -> Result<Vec<ModelVm>> {
        let models = self.storage.get_models_by_ids(&query.ids).await?;
        self.to_view_models(models).await
    }
}

#[async_trait]
impl Handler<FindModelByIdQuery> for ModelHandler {
    async fn handle(&self, query: FindModelByIdQuery) -> Result<Option<ModelVm>> {
        match self.storage.get_model_by_id(query.id).await? {
            Some(model) => Ok(Some(self.to_view_model(model).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Handler<ListModelByBrandIdQuery> for ModelHandler {
    async fn handle(&self, query: ListModelByBrandIdQuery) -> Result<Vec<ModelVm>> {
        let models = self.storage.get_models_by_brand_id(query.brand_id).await?;
        self.to_view_models(models).await
    }
}

#[async_trait]
impl Handler<CreateModelCommand> for ModelHandler {
    async fn handle(&self, command: CreateModelCommand) -> Result<ModelVm> {
        let mut model = self
            .checked(None, command.brand_id, &command.name)
            .await?;
        self.storage.create_model(&mut model).await?;
        info!("Model {:?} created: {}", model.id, model.name);
        self.to_view_model(model).await
    }
}

#[async_trait]
impl Handler<UpdateModelCommand> for ModelHandler {
    async fn handle(&self, command: UpdateModelCommand) -> Result<ModelVm> {
        let model = self
            .checked(Some(command.id), command.brand_id, &command.name)
            .await?;
        let current = self
            .storage
            .get_model_by_id(command.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("model", command.id))?;

        // Vehicles carry their own brand id, which must keep matching the model's
        if current.brand_id != model.brand_id
            && !self
                .storage
                .get_vehicles_by_model_id(command.id)
                .await?
                .is_empty()
        {
            return Err(ServiceError::Conflict(format!(
                "model {} has vehicles and cannot move to another brand",
                command.id
            )));
        }

        if !self.storage.update_model(&model).await? {
            return Err(ServiceError::not_found("model", command.id));
        }
        info!("Model {} updated", command.id);
        self.to_view_model(model).await
    }
}

#[async_trait]
impl Handler<RemoveModelCommand> for ModelHandler {
    async fn handle(&self, command: RemoveModelCommand) -> Result<RemoveResultVm> {
        if self.storage.get_model_by_id(command.id).await?.is_none() {
            return Err(ServiceError::not_found("model", command.id));
        }
        let vehicles = self.storage.get_vehicles_by_model_id(command.id).await?;
        if !vehicles.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "model {} is still used by {} vehicles",
                command.id,
                vehicles.len()
            )));
        }

        self.storage.delete_model(command.id).await?;
        info!("Model {} removed", command.id);
        Ok(RemoveResultVm::removed("model", command.id))
    }
}
