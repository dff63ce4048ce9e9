use crate::app::mediator::{Handler, MediatorBuilder, Request};
use crate::app::validation;
use crate::domain::ReferenceYear;
use crate::error::{Result, ServiceError, ValidationErrors};
use crate::storage::Storage;
use crate::view_models::{CreateReferenceYearVm, ReferenceYearVm, RemoveResultVm};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct ListReferenceYearQuery;

pub struct ListReferenceYearsByIdsQuery {
    pub ids: Vec<i64>,
}

pub struct FindReferenceYearByIdQuery {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateReferenceYearCommand {
    pub price_reference_number: i64,
    pub year: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReferenceYearCommand {
    pub id: i64,
    pub price_reference_number: i64,
    pub year: i64,
    pub description: Option<String>,
}

pub struct RemoveReferenceYearCommand {
    pub id: i64,
}

impl Request for ListReferenceYearQuery {
    type Response = Vec<ReferenceYearVm>;
    const NAME: &'static str = "ListReferenceYearQuery";
}

impl Request for ListReferenceYearsByIdsQuery {
    type Response = Vec<ReferenceYearVm>;
    const NAME: &'static str = "ListReferenceYearsByIdsQuery";
}

impl Request for FindReferenceYearByIdQuery {
    type Response = Option<ReferenceYearVm>;
    const NAME: &'static str = "FindReferenceYearByIdQuery";
}

impl Request for CreateReferenceYearCommand {
    type Response = ReferenceYearVm;
    const NAME: &'static str = "CreateReferenceYearCommand";
}

impl Request for UpdateReferenceYearCommand {
    type Response = ReferenceYearVm;
    const NAME: &'static str = "UpdateReferenceYearCommand";
}

impl Request for RemoveReferenceYearCommand {
    type Response = RemoveResultVm;
    const NAME: &'static str = "RemoveReferenceYearCommand";
}

impl From<CreateReferenceYearVm> for CreateReferenceYearCommand {
    fn from(vm: CreateReferenceYearVm) -> Self {
        Self {
            price_reference_number: vm.price_reference_number,
            year: vm.year,
            description: vm.description,
        }
    }
}

impl UpdateReferenceYearCommand {
    pub fn from_vm(id: i64, vm: CreateReferenceYearVm) -> Self {
        Self {
            id,
            price_reference_number: vm.price_reference_number,
            year: vm.year,
            description: vm.description,
        }
    }
}

pub struct ReferenceYearHandler {
    storage: Arc<dyn Storage>,
}

impl ReferenceYearHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn checked(
        &self,
        id: Option<i64>,
        price_reference_number: i64,
        year: i64,
        description: Option<&str>,
    ) -> Result<ReferenceYear> {
        let mut errors = ValidationErrors::new();
        validation::positive(&mut errors, "priceReferenceNumber", price_reference_number);
        validation::year_in_range(&mut errors, "year", year);
        let description = validation::optional_text(description);
        if let Some(text) = &description {
            if text.chars().count() > validation::MAX_NAME_LEN {
                errors.add(
                    "description",
                    format!("must be at most {} characters", validation::MAX_NAME_LEN),
                );
            }
        }
        errors.into_result()?;

        if let Some(existing) = self
            .storage
            .get_reference_year_by_number_and_year(price_reference_number, year)
            .await?
        {
            if existing.id != id {
                return Err(ServiceError::Conflict(format!(
                    "reference {price_reference_number}/{year} already exists"
                )));
            }
        }

        Ok(ReferenceYear {
            id,
            price_reference_number,
            year,
            description,
        })
    }
}

pub fn register(builder: MediatorBuilder, storage: Arc<dyn Storage>) -> MediatorBuilder {
    let handler = Arc::new(ReferenceYearHandler::new(storage));
    builder
        .register::<ListReferenceYearQuery, _>(handler.clone())
        .register::<ListReferenceYearsByIdsQuery, _>(handler.clone())
        .register::<FindReferenceYearByIdQuery, _>(handler.clone())
        .register::<CreateReferenceYearCommand, _>(handler.clone())
        .register::<UpdateReferenceYearCommand, _>(handler.clone())
        .register::<RemoveReferenceYearCommand, _>(handler)
}

#[async_trait]
impl Handler<ListReferenceYearQuery> for ReferenceYearHandler {
    async fn handle(&self, _query: ListReferenceYearQuery) -> Result<Vec<ReferenceYearVm>> {
        let rows = self.storage.list_reference_years().await?;
        Ok(rows.into_iter().map(ReferenceYearVm::from).collect())
    }
}

#[async_trait]
impl Handler<ListReferenceYearsByIdsQuery> for ReferenceYearHandler {
    async fn handle(&self, query: ListReferenceYearsByIdsQuery) -> Result<Vec<ReferenceYearVm>> {
        let rows = self.storage.get_reference_years_by_ids(&query.ids).await?;
        Ok(rows.into_iter().map(ReferenceYearVm::from).collect())
    }
}

#[async_trait]
impl Handler<FindReferenceYearByIdQuery> for ReferenceYearHandler {
    async fn handle(&self, query: FindReferenceYearByIdQuery) -> Result<Option<ReferenceYearVm>> {
        Ok(self
            .storage
            .get_reference_year_by_id(query.id)
            .await?
            .map(ReferenceYearVm::from))
    }
}

#[async_trait]
impl Handler<CreateReferenceYearCommand> for ReferenceYearHandler {
    async fn handle(&self, command: CreateReferenceYearCommand) -> Result<ReferenceYearVm> {
        let mut reference_year = self
            .checked(
                None,
                command.price_reference_number,
                command.year,
                command.description.as_deref(),
            )
            .await?;
        self.storage
            .create_reference_year(&mut reference_year)
            .await?;
        info!(
            "Reference year {:?} created: {}/{}",
            reference_year.id, reference_year.price_reference_number, reference_year.year
        );
        Ok(reference_year.into())
    }
}

#[async_trait]
impl Handler<UpdateReferenceYearCommand> for ReferenceYearHandler {
    async fn handle(&self, command: UpdateReferenceYearCommand) -> Result<ReferenceYearVm> {
        let reference_year = self
            .checked(
                Some(command.id),
                command.price_reference_number,
                command.year,
                command.description.as_deref(),
            )
            .await?;
        if !self.storage.update_reference_year(&reference_year).await? {
            return Err(ServiceError::not_found("reference year", command.id));
        }
        info!("Reference year {} updated", command.id);
        Ok(reference_year.into())
    }
}

#[async_trait]
impl Handler<RemoveReferenceYearCommand> for ReferenceYearHandler {
    async fn handle(&self, command: RemoveReferenceYearCommand) -> Result<RemoveResultVm> {
        if self
            .storage
            .get_reference_year_by_id(command.id)
            .await?
            .is_none()
        {
            return Err(ServiceError::not_found("reference year", command.id));
        }
        let vehicles = self
            .storage
            .get_vehicles_by_reference_year_id(command.id)
            .await?;
        if !vehicles.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "reference year {} is still used by {} vehicles",
                command.id,
                vehicles.len()
            )));
        }

        self.storage.delete_reference_year(command.id).await?;
        info!("Reference year {} removed", command.id);
        Ok(RemoveResultVm::removed("reference year", command.id))
    }
}
