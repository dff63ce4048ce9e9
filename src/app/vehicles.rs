//! Vehicle queries and commands.
//!
//! Every response is a [`VehicleVm`], which flattens the brand, model and
//! reference year a vehicle points at. Those rows are loaded once per batch.

use crate::app::mediator::{Handler, MediatorBuilder, Request};
use crate::app::{index_by_id, validation};
use crate::domain::{FuelType, Vehicle};
use crate::error::{Result, ServiceError, ValidationErrors};
use crate::storage::Storage;
use crate::view_models::{CreateVehicleVm, RemoveResultVm, VehicleVm};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ListVehicleQuery;

pub struct ListVehiclesByIdsQuery {
    pub ids: Vec<i64>,
}

pub struct FindVehicleByIdQuery {
    pub id: i64,
}

/// Vehicles priced in the table identified by `price_reference_number` and `year`
#[derive(Debug, Clone, PartialEq)]
pub struct ListVehicleByReferenceYearQuery {
    pub price_reference_number: i64,
    pub year: i64,
}

pub struct ListVehicleByBrandIdQuery {
    pub brand_id: i64,
}

pub struct ListVehicleByModelIdQuery {
    pub model_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateVehicleCommand {
    pub brand_id: i64,
    pub model_id: i64,
    pub reference_year_id: i64,
    pub model_year: i64,
    pub fuel: FuelType,
    pub fipe_code: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateVehicleCommand {
    pub id: i64,
    pub vehicle: CreateVehicleCommand,
}

pub struct RemoveVehicleCommand {
    pub id: i64,
}

impl Request for ListVehicleQuery {
    type Response = Vec<VehicleVm>;
    const NAME: &'static str = "ListVehicleQuery";
}

impl Request for ListVehiclesByIdsQuery {
    type Response = Vec<VehicleVm>;
    const NAME: &'static str = "ListVehiclesByIdsQuery";
}

impl Request for FindVehicleByIdQuery {
    type Response = Option<VehicleVm>;
    const NAME: &'static str = "FindVehicleByIdQuery";
}

impl Request for ListVehicleByReferenceYearQuery {
    type Response = Vec<VehicleVm>;
    const NAME: &'static str = "ListVehicleByReferenceYearQuery";
}

impl Request for ListVehicleByBrandIdQuery {
    type Response = Vec<VehicleVm>;
    const NAME: &'static str = "ListVehicleByBrandIdQuery";
}

impl Request for ListVehicleByModelIdQuery {
    type Response = Vec<VehicleVm>;
    const NAME: &'static str = "ListVehicleByModelIdQuery";
}

impl Request for CreateVehicleCommand {
    type Response = VehicleVm;
    const NAME: &'static str = "CreateVehicleCommand";
}

impl Request for UpdateVehicleCommand {
    type Response = VehicleVm;
    const NAME: &'static str = "UpdateVehicleCommand";
}

impl Request for RemoveVehicleCommand {
    type Response = RemoveResultVm;
    const NAME: &'static str = "RemoveVehicleCommand";
}

impl From<CreateVehicleVm> for CreateVehicleCommand {
    fn from(vm: CreateVehicleVm) -> Self {
        Self {
            brand_id: vm.brand_id,
            model_id: vm.model_id,
            reference_year_id: vm.reference_year_id,
            model_year: vm.model_year,
            fuel: vm.fuel,
            fipe_code: vm.fipe_code,
            price: vm.price,
        }
    }
}

impl UpdateVehicleCommand {
    pub fn from_vm(id: i64, vm: CreateVehicleVm) -> Self {
        Self {
            id,
            vehicle: vm.into(),
        }
    }
}

pub struct VehicleHandler {
    storage: Arc<dyn Storage>,
}

impl VehicleHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn to_view_models(&self, vehicles: Vec<Vehicle>) -> Result<Vec<VehicleVm>> {
        if vehicles.is_empty() {
            return Ok(Vec::new());
        }
        let brand_ids: Vec<i64> = vehicles.iter().map(|v| v.brand_id).collect();
        let model_ids: Vec<i64> = vehicles.iter().map(|v| v.model_id).collect();
        let reference_ids: Vec<i64> = vehicles.iter().map(|v| v.reference_year_id).collect();

        let brands = index_by_id(self.storage.get_brands_by_ids(&brand_ids).await?, |b| b.id);
        let models = index_by_id(self.storage.get_models_by_ids(&model_ids).await?, |m| m.id);
        let references = index_by_id(
            self.storage.get_reference_years_by_ids(&reference_ids).await?,
            |r| r.id,
        );
        debug!(
            "Mapping {} vehicles over {} brands, {} models, {} reference years",
            vehicles.len(),
            brands.len(),
            models.len(),
            references.len()
        );

        Ok(vehicles
            .into_iter()
            .map(|vehicle| {
                let reference = references.get(&vehicle.reference_year_id);
                VehicleVm {
                    id: vehicle.id.unwrap_or_default(),
                    brand_id: vehicle.brand_id,
                    brand_name: brands
                        .get(&vehicle.brand_id)
                        .map(|b| b.name.clone())
                        .unwrap_or_default(),
                    model_id: vehicle.model_id,
                    model_name: models
                        .get(&vehicle.model_id)
                        .map(|m| m.name.clone())
                        .unwrap_or_default(),
                    reference_year_id: vehicle.reference_year_id,
                    price_reference_number: reference
                        .map(|r| r.price_reference_number)
                        .unwrap_or_default(),
                    reference_year: reference.map(|r| r.year).unwrap_or_default(),
                    model_year: vehicle.model_year,
                    fuel: vehicle.fuel,
                    fipe_code: vehicle.fipe_code,
                    price: vehicle.price,
                }
            })
            .collect())
    }

    async fn to_view_model(&self, vehicle: Vehicle) -> Result<VehicleVm> {
        let mut vms = self.to_view_models(vec![vehicle]).await?;
        vms.pop().ok_or_else(|| ServiceError::Database {
            message: "vehicle mapping produced no row".to_string(),
        })
    }

    /// Field rules first, then every referenced row must exist and the model
    /// must belong to the brand
    async fn checked(&self, id: Option<i64>, command: &CreateVehicleCommand) -> Result<Vehicle> {
        let mut errors = ValidationErrors::new();
        validation::year_in_range(&mut errors, "modelYear", command.model_year);
        let fipe_code = validation::fipe_code(&mut errors, "fipeCode", &command.fipe_code);
        validation::price(&mut errors, "price", command.price);

        if self.storage.get_brand_by_id(command.brand_id).await?.is_none() {
            errors.add("brandId", format!("brand {} does not exist", command.brand_id));
        }
        match self.storage.get_model_by_id(command.model_id).await? {
            None => errors.add("modelId", format!("model {} does not exist", command.model_id)),
            Some(model) if model.brand_id != command.brand_id => errors.add(
                "modelId",
                format!(
                    "model {} does not belong to brand {}",
                    command.model_id, command.brand_id
                ),
            ),
            Some(_) => {}
        }
        if self
            .storage
            .get_reference_year_by_id(command.reference_year_id)
            .await?
            .is_none()
        {
            errors.add(
                "referenceYearId",
                format!("reference year {} does not exist", command.reference_year_id),
            );
        }
        errors.into_result()?;

        Ok(Vehicle {
            id,
            brand_id: command.brand_id,
            model_id: command.model_id,
            reference_year_id: command.reference_year_id,
            model_year: command.model_year,
            fuel: command.fuel,
            fipe_code,
            price: command.price,
        })
    }
}

pub fn register(builder: MediatorBuilder, storage: Arc<dyn Storage>) -> MediatorBuilder {
    let handler = Arc::new(VehicleHandler::new(storage));
    builder
        .register::<ListVehicleQuery, _>(handler.clone())
        .register::<ListVehiclesByIdsQuery, _>(handler.clone())
        .register::<FindVehicleByIdQuery, _>(handler.clone())
        .register::<ListVehicleByReferenceYearQuery, _>(handler.clone())
        .register::<ListVehicleByBrandIdQuery, _>(handler.clone())
        .register::<ListVehicleByModelIdQuery, _>(handler.clone())
        .register::<CreateVehicleCommand, _>(handler.clone())
        .register::<UpdateVehicleCommand, _>(handler.clone())
        .register::<RemoveVehicleCommand, _>(handler)
}

#[async_trait]
impl Handler<ListVehicleQuery> for VehicleHandler {
    async fn handle(&self, _query: ListVehicleQuery) -> Result<Vec<VehicleVm>> {
        let vehicles = self.storage.list_vehicles().await?;
        self.to_view_models(vehicles).await
    }
}

#[async_trait]
impl Handler<ListVehiclesByIdsQuery> for VehicleHandler {
    async fn handle(&self, query: ListVehiclesByIdsQuery) -> Result<Vec<VehicleVm>> {
        let vehicles = self.storage.get_vehicles_by_ids(&query.ids).await?;
        self.to_view_models(vehicles).await
    }
}

#[async_trait]
impl Handler<FindVehicleByIdQuery> for VehicleHandler {
    async fn handle(&self, query: FindVehicleByIdQuery) -> Result<Option<VehicleVm>> {
        match self.storage.get_vehicle_by_id(query.id).await? {
            Some(vehicle) => Ok(Some(self.to_view_model(vehicle).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Handler<ListVehicleByReferenceYearQuery> for VehicleHandler {
    async fn handle(&self, query: ListVehicleByReferenceYearQuery) -> Result<Vec<VehicleVm>> {
        let Some(reference) = self
            .storage
            .get_reference_year_by_number_and_year(query.price_reference_number, query.year)
            .await?
        else {
            debug!(
                "No reference year {}/{}",
                query.price_reference_number, query.year
            );
            return Ok(Vec::new());
        };
        let Some(reference_id) = reference.id else {
            return Ok(Vec::new());
        };

        let vehicles = self
            .storage
            .get_vehicles_by_reference_year_id(reference_id)
            .await?;
        self.to_view_models(vehicles).await
    }
}

#[async_trait]
impl Handler<ListVehicleByBrandIdQuery> for VehicleHandler {
    async fn handle(&self, query: ListVehicleByBrandIdQuery) -> Result<Vec<VehicleVm>> {
        let vehicles = self.storage.get_vehicles_by_brand_id(query.brand_id).await?;
        self.to_view_models(vehicles).await
    }
}

#[async_trait]
impl Handler<ListVehicleByModelIdQuery> for VehicleHandler {
    async fn handle(&self, query: ListVehicleByModelIdQuery) -> Result<Vec<VehicleVm>> {
        let vehicles = self.storage.get_vehicles_by_model_id(query.model_id).await?;
        self.to_view_models(vehicles).await
    }
}

#[async_trait]
impl Handler<CreateVehicleCommand> for VehicleHandler {
    async fn handle(&self, command: CreateVehicleCommand) -> Result<VehicleVm> {
        let mut vehicle = self.checked(None, &command).await?;
        self.storage.create_vehicle(&mut vehicle).await?;
        info!("Vehicle {:?} created: {}", vehicle.id, vehicle.fipe_code);
        self.to_view_model(vehicle).await
    }
}

#[async_trait]
impl Handler<UpdateVehicleCommand> for VehicleHandler {
    async fn handle(&self, command: UpdateVehicleCommand) -> Result<VehicleVm> {
        let vehicle = self.checked(Some(command.id), &command.vehicle).await?;
        if !self.storage.update_vehicle(&vehicle).await? {
            return Err(ServiceError::not_found("vehicle", command.id));
        }
        info!("Vehicle {} updated", command.id);
        self.to_view_model(vehicle).await
    }
}

#[async_trait]
impl Handler<RemoveVehicleCommand> for VehicleHandler {
    async fn handle(&self, command: RemoveVehicleCommand) -> Result<RemoveResultVm> {
        if self.storage.get_vehicle_by_id(command.id).await?.is_none() {
            return Err(ServiceError::not_found("vehicle", command.id));
        }
        let evaluations = self
            .storage
            .get_evaluations_by_vehicle_id(command.id)
            .await?;
        if !evaluations.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "vehicle {} has {} evaluations",
                command.id,
                evaluations.len()
            )));
        }

        self.storage.delete_vehicle(command.id).await?;
        info!("Vehicle {} removed", command.id);
        Ok(RemoveResultVm::removed("vehicle", command.id))
    }
}
