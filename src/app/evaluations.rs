use crate::app::mediator::{Handler, MediatorBuilder, Request};
use crate::app::{index_by_id, validation};
use crate::domain::Evaluation;
use crate::error::{Result, ServiceError, ValidationErrors};
use crate::storage::Storage;
use crate::view_models::{CreateEvaluationVm, EvaluationVm, RemoveResultVm};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

pub struct ListEvaluationQuery;

pub struct ListEvaluationsByIdsQuery {
    pub ids: Vec<i64>,
}

pub struct FindEvaluationByIdQuery {
    pub id: i64,
}

pub struct ListEvaluationByVehicleIdQuery {
    pub vehicle_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateEvaluationCommand {
    pub vehicle_id: i64,
    pub evaluated_price: f64,
    pub evaluated_on: NaiveDate,
    pub evaluator: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvaluationCommand {
    pub id: i64,
    pub evaluation: CreateEvaluationCommand,
}

pub struct RemoveEvaluationCommand {
    pub id: i64,
}

impl Request for ListEvaluationQuery {
    type Response = Vec<EvaluationVm>;
    const NAME: &'static str = "ListEvaluationQuery";
}

impl Request for ListEvaluationsByIdsQuery {
    type Response = Vec<EvaluationVm>;
    const NAME: &'static str = "ListEvaluationsByIdsQuery";
}

impl Request for FindEvaluationByIdQuery {
    type Response = Option<EvaluationVm>;
    const NAME: &'static str = "FindEvaluationByIdQuery";
}

impl Request for ListEvaluationByVehicleIdQuery {
    type Response = Vec<EvaluationVm>;
    const NAME: &'static str = "ListEvaluationByVehicleIdQuery";
}

impl Request for CreateEvaluationCommand {
    type Response = EvaluationVm;
    const NAME: &'static str = "CreateEvaluationCommand";
}

impl Request for UpdateEvaluationCommand {
    type Response = EvaluationVm;
    const NAME: &'static str = "UpdateEvaluationCommand";
}

impl Request for RemoveEvaluationCommand {
    type Response = RemoveResultVm;
    const NAME: &'static str = "RemoveEvaluationCommand";
}

impl From<CreateEvaluationVm> for CreateEvaluationCommand {
    fn from(vm: CreateEvaluationVm) -> Self {
        Self {
            vehicle_id: vm.vehicle_id,
            evaluated_price: vm.evaluated_price,
            evaluated_on: vm.evaluated_on,
            evaluator: vm.evaluator,
            notes: vm.notes,
        }
    }
}

impl UpdateEvaluationCommand {
    pub fn from_vm(id: i64, vm: CreateEvaluationVm) -> Self {
        Self {
            id,
            evaluation: vm.into(),
        }
    }
}

pub struct EvaluationHandler {
    storage: Arc<dyn Storage>,
}

impl EvaluationHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Joins each evaluation with its vehicle's catalog price
    async fn to_view_models(&self, evaluations: Vec<Evaluation>) -> Result<Vec<EvaluationVm>> {
        let vehicle_ids: Vec<i64> = evaluations.iter().map(|e| e.vehicle_id).collect();
        let vehicles = index_by_id(
            self.storage.get_vehicles_by_ids(&vehicle_ids).await?,
            |v| v.id,
        );

        Ok(evaluations
            .into_iter()
            .map(|evaluation| {
                let vehicle = vehicles.get(&evaluation.vehicle_id);
                let reference_price = vehicle.map(|v| v.price).unwrap_or_default();
                EvaluationVm {
                    id: evaluation.id.unwrap_or_default(),
                    vehicle_id: evaluation.vehicle_id,
                    fipe_code: vehicle.map(|v| v.fipe_code.clone()).unwrap_or_default(),
                    evaluated_price: evaluation.evaluated_price,
                    reference_price,
                    price_difference: evaluation.evaluated_price - reference_price,
                    evaluated_on: evaluation.evaluated_on,
                    evaluator: evaluation.evaluator,
                    notes: evaluation.notes,
                    created_at: evaluation.created_at,
                }
            })
            .collect())
    }

    async fn to_view_model(&self, evaluation: Evaluation) -> Result<EvaluationVm> {
        let mut vms = self.to_view_models(vec![evaluation]).await?;
        vms.pop().ok_or_else(|| ServiceError::Database {
            message: "evaluation mapping produced no row".to_string(),
        })
    }

    async fn checked(
        &self,
        id: Option<i64>,
        command: &CreateEvaluationCommand,
        created_at: DateTime<Utc>,
    ) -> Result<Evaluation> {
        let mut errors = ValidationErrors::new();
        validation::price(&mut errors, "evaluatedPrice", command.evaluated_price);
        validation::not_in_future(&mut errors, "evaluatedOn", command.evaluated_on);
        let evaluator = validation::required_name(&mut errors, "evaluator", &command.evaluator);
        if self
            .storage
            .get_vehicle_by_id(command.vehicle_id)
            .await?
            .is_none()
        {
            errors.add(
                "vehicleId",
                format!("vehicle {} does not exist", command.vehicle_id),
            );
        }
        errors.into_result()?;

        Ok(Evaluation {
            id,
            vehicle_id: command.vehicle_id,
            evaluated_price: command.evaluated_price,
            evaluated_on: command.evaluated_on,
            evaluator,
            notes: validation::optional_text(command.notes.as_deref()),
            created_at,
        })
    }
}

pub fn register(builder: MediatorBuilder, storage: Arc<dyn Storage>) -> MediatorBuilder {
    let handler = Arc::new(EvaluationHandler::new(storage));
    builder
        .register::<ListEvaluationQuery, _>(handler.clone())
        .register::<ListEvaluationsByIdsQuery, _>(handler.clone())
        .register::<FindEvaluationByIdQuery, _>(handler.clone())
        .register::<ListEvaluationByVehicleIdQuery, _>(handler.clone())
        .register::<CreateEvaluationCommand, _>(handler.clone())
        .register::<UpdateEvaluationCommand, _>(handler.clone())
        .register::<RemoveEvaluationCommand, _>(handler)
}

#[async_trait]
impl Handler<ListEvaluationQuery> for EvaluationHandler {
    async fn handle(&self, _query: ListEvaluationQuery) -> Result<Vec<EvaluationVm>> {
        let evaluations = self.storage.list_evaluations().await?;
        self.to_view_models(evaluations).await
    }
}

#[async_trait]
impl Handler<ListEvaluationsByIdsQuery> for EvaluationHandler {
    async fn handle(&self, query: ListEvaluationsByIdsQuery) -> Result<Vec<EvaluationVm>> {
        let evaluations = self.storage.get_evaluations_by_ids(&query.ids).await?;
        self.to_view_models(evaluations).await
    }
}

#[async_trait]
impl Handler<FindEvaluationByIdQuery> for EvaluationHandler {
    async fn handle(&self, query: FindEvaluationByIdQuery) -> Result<Option<EvaluationVm>> {
        match self.storage.get_evaluation_by_id(query.id).await? {
            Some(evaluation) => Ok(Some(self.to_view_model(evaluation).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Handler<ListEvaluationByVehicleIdQuery> for EvaluationHandler {
    async fn handle(&self, query: ListEvaluationByVehicleIdQuery) -> Result<Vec<EvaluationVm>> {
        let evaluations = self
            .storage
            .get_evaluations_by_vehicle_id(query.vehicle_id)
            .await?;
        self.to_view_models(evaluations).await
    }
}

#[async_trait]
impl Handler<CreateEvaluationCommand> for EvaluationHandler {
    async fn handle(&self, command: CreateEvaluationCommand) -> Result<EvaluationVm> {
        let mut evaluation = self.checked(None, &command, Utc::now()).await?;
        self.storage.create_evaluation(&mut evaluation).await?;
        info!(
            "Evaluation {:?} created for vehicle {} by {}",
            evaluation.id, evaluation.vehicle_id, evaluation.evaluator
        );
        self.to_view_model(evaluation).await
    }
}

#[async_trait]
impl Handler<UpdateEvaluationCommand> for EvaluationHandler {
    async fn handle(&self, command: UpdateEvaluationCommand) -> Result<EvaluationVm> {
        // created_at is replaced with the stored stamp once the row is found
        let mut evaluation = self
            .checked(Some(command.id), &command.evaluation, Utc::now())
            .await?;
        let current = self
            .storage
            .get_evaluation_by_id(command.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("evaluation", command.id))?;
        evaluation.created_at = current.created_at;

        if !self.storage.update_evaluation(&evaluation).await? {
            return Err(ServiceError::not_found("evaluation", command.id));
        }
        info!("Evaluation {} updated", command.id);
        self.to_view_model(evaluation).await
    }
}

#[async_trait]
impl Handler<RemoveEvaluationCommand> for EvaluationHandler {
    async fn handle(&self, command: RemoveEvaluationCommand) -> Result<RemoveResultVm> {
        if !self.storage.delete_evaluation(command.id).await? {
            return Err(ServiceError::not_found("evaluation", command.id));
        }
        info!("Evaluation {} removed", command.id);
        Ok(RemoveResultVm::removed("evaluation", command.id))
    }
}
