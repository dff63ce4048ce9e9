use crate::app::mediator::{Handler, MediatorBuilder, Request};
use crate::app::validation;
use crate::domain::Brand;
use crate::error::{Result, ServiceError, ValidationErrors};
use crate::storage::Storage;
use crate::view_models::{BrandVm, CreateBrandVm, RemoveResultVm};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct ListBrandQuery;

pub struct ListBrandsByIdsQuery {
    pub ids: Vec<i64>,
}

pub struct FindBrandByIdQuery {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateBrandCommand {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBrandCommand {
    pub id: i64,
    pub name: String,
}

pub struct RemoveBrandCommand {
    pub id: i64,
}

impl Request for ListBrandQuery {
    type Response = Vec<BrandVm>;
    const NAME: &'static str = "ListBrandQuery";
}

impl Request for ListBrandsByIdsQuery {
    type Response = Vec<BrandVm>;
    const NAME: &'static str = "ListBrandsByIdsQuery";
}

impl Request for FindBrandByIdQuery {
    type Response = Option<BrandVm>;
    const NAME: &'static str = "FindBrandByIdQuery";
}

impl Request for CreateBrandCommand {
    type Response = BrandVm;
    const NAME: &'static str = "CreateBrandCommand";
}

impl Request for UpdateBrandCommand {
    type Response = BrandVm;
    const NAME: &'static str = "UpdateBrandCommand";
}

impl Request for RemoveBrandCommand {
    type Response = RemoveResultVm;
    const NAME: &'static str = "RemoveBrandCommand";
}

impl From<CreateBrandVm> for CreateBrandCommand {
    fn from(vm: CreateBrandVm) -> Self {
        Self { name: vm.name }
    }
}

impl UpdateBrandCommand {
    pub fn from_vm(id: i64, vm: CreateBrandVm) -> Self {
        Self { id, name: vm.name }
    }
}

pub struct BrandHandler {
    storage: Arc<dyn Storage>,
}

impl BrandHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Validated, trimmed name that no other brand uses
    async fn checked_name(&self, name: &str, id: Option<i64>) -> Result<String> {
        let mut errors = ValidationErrors::new();
        let name = validation::required_name(&mut errors, "name", name);
        errors.into_result()?;

        if let Some(existing) = self.storage.get_brand_by_name(&name).await? {
            if existing.id != id {
                return Err(ServiceError::Conflict(format!(
                    "brand '{}' already exists",
                    existing.name
                )));
            }
        }
        Ok(name)
    }
}

pub fn register(builder: MediatorBuilder, storage: Arc<dyn Storage>) -> MediatorBuilder {
    let handler = Arc::new(BrandHandler::new(storage));
    builder
        .register::<ListBrandQuery, _>(handler.clone())
        .register::<ListBrandsByIdsQuery, _>(handler.clone())
        .register::<FindBrandByIdQuery, _>(handler.clone())
        .register::<CreateBrandCommand, _>(handler.clone())
        .register::<UpdateBrandCommand, _>(handler.clone())
        .register::<RemoveBrandCommand, _>(handler)
}

#[async_trait]
impl Handler<ListBrandQuery> for BrandHandler {
    async fn handle(&self, _query: ListBrandQuery) -> Result<Vec<BrandVm>> {
        let brands = self.storage.list_brands().await?;
        Ok(brands.into_iter().map(BrandVm::from).collect())
    }
}

#[async_trait]
impl Handler<ListBrandsByIdsQuery> for BrandHandler {
    async fn handle(&self, query: ListBrandsByIdsQuery) -> Result<Vec<BrandVm>> {
        let brands = self.storage.get_brands_by_ids(&query.ids).await?;
        Ok(brands.into_iter().map(BrandVm::from).collect())
    }
}

#[async_trait]
impl Handler<FindBrandByIdQuery> for BrandHandler {
    async fn handle(&self, query: FindBrandByIdQuery) -> Result<Option<BrandVm>> {
        Ok(self.storage.get_brand_by_id(query.id).await?.map(BrandVm::from))
    }
}

#[async_trait]
impl Handler<CreateBrandCommand> for BrandHandler {
    async fn handle(&self, command: CreateBrandCommand) -> Result<BrandVm> {
        let name = self.checked_name(&command.name, None).await?;
        let mut brand = Brand { id: None, name };
        self.storage.create_brand(&mut brand).await?;
        info!("Brand {:?} created: {}", brand.id, brand.name);
        Ok(brand.into())
    }
}

#[async_trait]
impl Handler<UpdateBrandCommand> for BrandHandler {
    async fn handle(&self, command: UpdateBrandCommand) -> Result<BrandVm> {
        let name = self.checked_name(&command.name, Some(command.id)).await?;
        let brand = Brand {
            id: Some(command.id),
            name,
        };
        if !self.storage.update_brand(&brand).await? {
            return Err(ServiceError::not_found("brand", command.id));
        }
        info!("Brand {} updated", command.id);
        Ok(brand.into())
    }
}

#[async_trait]
impl Handler<RemoveBrandCommand> for BrandHandler {
    async fn handle(&self, command: RemoveBrandCommand) -> Result<RemoveResultVm> {
        if self.storage.get_brand_by_id(command.id).await?.is_none() {
            return Err(ServiceError::not_found("brand", command.id));
        }
        let models = self.storage.get_models_by_brand_id(command.id).await?;
        let vehicles = self.storage.get_vehicles_by_brand_id(command.id).await?;
        if !models.is_empty() || !vehicles.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "brand {} is still used by {} models and {} vehicles",
                command.id,
                models.len(),
                vehicles.len()
            )));
        }

        self.storage.delete_brand(command.id).await?;
        info!("Brand {} removed", command.id);
        Ok(RemoveResultVm::removed("brand", command.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Model;
    use crate::storage::InMemoryStorage;

    fn handler() -> (BrandHandler, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        (BrandHandler::new(storage.clone()), storage)
    }

    async fn create(handler: &BrandHandler, name: &str) -> Result<BrandVm> {
        handler
            .handle(CreateBrandCommand {
                name: name.to_string(),
            })
            .await
    }

    #[tokio::test]
    async fn create_trims_and_lists() {
        let (handler, _) = handler();
        let fiat = create(&handler, "  Fiat ").await.unwrap();
        assert_eq!(fiat, BrandVm { id: 1, name: "Fiat".to_string() });
        create(&handler, "Ford").await.unwrap();

        let all = handler.handle(ListBrandQuery).await.unwrap();
        assert_eq!(all.len(), 2);
        let some = handler
            .handle(ListBrandsByIdsQuery { ids: vec![2, 9] })
            .await
            .unwrap();
        assert_eq!(some[0].name, "Ford");
        assert!(handler
            .handle(FindBrandByIdQuery { id: 9 })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn blank_or_duplicate_names_are_rejected() {
        let (handler, _) = handler();
        assert!(matches!(
            create(&handler, " ").await,
            Err(ServiceError::Validation(_))
        ));

        create(&handler, "Chevrolet").await.unwrap();
        assert!(matches!(
            create(&handler, "CHEVROLET").await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_keeps_own_name_and_reports_missing() {
        let (handler, _) = handler();
        create(&handler, "Renault").await.unwrap();

        let renamed = handler
            .handle(UpdateBrandCommand {
                id: 1,
                name: "renault".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(renamed.name, "renault");

        let err = handler
            .handle(UpdateBrandCommand {
                id: 5,
                name: "Peugeot".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "brand", id: 5 }));
    }

    #[tokio::test]
    async fn remove_refuses_brands_with_models() {
        let (handler, storage) = handler();
        create(&handler, "Toyota").await.unwrap();
        create(&handler, "Kia").await.unwrap();
        storage
            .create_model(&mut Model {
                id: None,
                brand_id: 1,
                name: "Corolla".to_string(),
            })
            .await
            .unwrap();

        let err = handler.handle(RemoveBrandCommand { id: 1 }).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let removed = handler.handle(RemoveBrandCommand { id: 2 }).await.unwrap();
        assert!(removed.success);
        assert_eq!(removed.id, 2);

        let err = handler.handle(RemoveBrandCommand { id: 2 }).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
