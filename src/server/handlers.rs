use crate::app::mediator::Request;
use crate::app::{brands, evaluations, models, reference_years, vehicles};
use crate::error::ServiceError;
use crate::server::extract::{ApiJson, ApiPath, Authenticated};
use crate::server::AppState;
use crate::view_models::{
    BrandVm, CreateBrandVm, CreateEvaluationVm, CreateModelVm, CreateReferenceYearVm,
    CreateVehicleVm, EvaluationVm, ModelVm, ReferenceYearVm, RemoveResultVm, VehicleVm,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::info;

type ApiResult<T> = Result<Json<T>, ServiceError>;

async fn send<R: Request>(state: &AppState, request: R) -> ApiResult<R::Response> {
    state.mediator.send(request).await.map(Json)
}

/// A missing single item answers 204 with no body
async fn send_find<R, T>(state: &AppState, request: R) -> Result<Response, ServiceError>
where
    R: Request<Response = Option<T>>,
    T: Serialize,
{
    Ok(match state.mediator.send(request).await? {
        Some(vm) => Json(vm).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "vehicles-service",
        "version": env!("CARGO_PKG_VERSION"),
        "handlers": state.mediator.handler_count(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let rendered = if state.metrics_enabled {
        crate::metrics::render()
    } else {
        None
    };
    match rendered {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics are disabled").into_response(),
    }
}

// Vehicles

pub async fn list_vehicles(State(state): State<AppState>) -> ApiResult<Vec<VehicleVm>> {
    send(&state, vehicles::ListVehicleQuery).await
}

pub async fn list_vehicles_by_ids(
    State(state): State<AppState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Vec<VehicleVm>> {
    send(&state, vehicles::ListVehiclesByIdsQuery { ids }).await
}

pub async fn find_vehicle(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ServiceError> {
    send_find(&state, vehicles::FindVehicleByIdQuery { id }).await
}

pub async fn list_vehicles_by_reference_year(
    State(state): State<AppState>,
    ApiPath((price_reference_number, year)): ApiPath<(i64, i64)>,
) -> ApiResult<Vec<VehicleVm>> {
    let query = vehicles::ListVehicleByReferenceYearQuery {
        price_reference_number,
        year,
    };
    send(&state, query).await
}

/// Served at `/vehicles/vehicle/{id}`; the id is a brand id
pub async fn list_vehicles_by_brand(
    State(state): State<AppState>,
    ApiPath(brand_id): ApiPath<i64>,
) -> ApiResult<Vec<VehicleVm>> {
    send(&state, vehicles::ListVehicleByBrandIdQuery { brand_id }).await
}

pub async fn list_vehicles_by_model(
    State(state): State<AppState>,
    ApiPath(model_id): ApiPath<i64>,
) -> ApiResult<Vec<VehicleVm>> {
    send(&state, vehicles::ListVehicleByModelIdQuery { model_id }).await
}

pub async fn create_vehicle(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiJson(vm): ApiJson<CreateVehicleVm>,
) -> ApiResult<VehicleVm> {
    send(&state, vehicles::CreateVehicleCommand::from(vm)).await
}

pub async fn update_vehicle(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(vm): ApiJson<CreateVehicleVm>,
) -> ApiResult<VehicleVm> {
    send(&state, vehicles::UpdateVehicleCommand::from_vm(id, vm)).await
}

pub async fn remove_vehicle(
    caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RemoveResultVm> {
    info!("{} removing vehicle {}", caller.client, id);
    send(&state, vehicles::RemoveVehicleCommand { id }).await
}

// Brands

pub async fn list_brands(State(state): State<AppState>) -> ApiResult<Vec<BrandVm>> {
    send(&state, brands::ListBrandQuery).await
}

pub async fn list_brands_by_ids(
    State(state): State<AppState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Vec<BrandVm>> {
    send(&state, brands::ListBrandsByIdsQuery { ids }).await
}

pub async fn find_brand(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ServiceError> {
    send_find(&state, brands::FindBrandByIdQuery { id }).await
}

pub async fn create_brand(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiJson(vm): ApiJson<CreateBrandVm>,
) -> ApiResult<BrandVm> {
    send(&state, brands::CreateBrandCommand::from(vm)).await
}

pub async fn update_brand(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(vm): ApiJson<CreateBrandVm>,
) -> ApiResult<BrandVm> {
    send(&state, brands::UpdateBrandCommand::from_vm(id, vm)).await
}

pub async fn remove_brand(
    caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RemoveResultVm> {
    info!("{} removing brand {}", caller.client, id);
    send(&state, brands::RemoveBrandCommand { id }).await
}

// Models

pub async fn list_models(State(state): State<AppState>) -> ApiResult<Vec<ModelVm>> {
    send(&state, models::ListModelQuery).await
}

pub async fn list_models_by_ids(
    State(state): State<AppState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Vec<ModelVm>> {
    send(&state, models::ListModelsByIdsQuery { ids }).await
}

pub async fn find_model(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ServiceError> {
    send_find(&state, models::FindModelByIdQuery { id }).await
}

pub async fn list_models_by_brand(
    State(state): State<AppState>,
    ApiPath(brand_id): ApiPath<i64>,
) -> ApiResult<Vec<ModelVm>> {
    send(&state, models::ListModelByBrandIdQuery { brand_id }).await
}

pub async fn create_model(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiJson(vm): ApiJson<CreateModelVm>,
) -> ApiResult<ModelVm> {
    send(&state, models::CreateModelCommand::from(vm)).await
}

pub async fn update_model(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(vm): ApiJson<CreateModelVm>,
) -> ApiResult<ModelVm> {
    send(&state, models::UpdateModelCommand::from_vm(id, vm)).await
}

pub async fn remove_model(
    caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RemoveResultVm> {
    info!("{} removing model {}", caller.client, id);
    send(&state, models::RemoveModelCommand { id }).await
}

// Reference years

pub async fn list_reference_years(
    State(state): State<AppState>,
) -> ApiResult<Vec<ReferenceYearVm>> {
    send(&state, reference_years::ListReferenceYearQuery).await
}

pub async fn list_reference_years_by_ids(
    State(state): State<AppState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Vec<ReferenceYearVm>> {
    send(&state, reference_years::ListReferenceYearsByIdsQuery { ids }).await
}

pub async fn find_reference_year(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ServiceError> {
    send_find(&state, reference_years::FindReferenceYearByIdQuery { id }).await
}

pub async fn create_reference_year(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiJson(vm): ApiJson<CreateReferenceYearVm>,
) -> ApiResult<ReferenceYearVm> {
    send(&state, reference_years::CreateReferenceYearCommand::from(vm)).await
}

pub async fn update_reference_year(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(vm): ApiJson<CreateReferenceYearVm>,
) -> ApiResult<ReferenceYearVm> {
    let command = reference_years::UpdateReferenceYearCommand::from_vm(id, vm);
    send(&state, command).await
}

pub async fn remove_reference_year(
    caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RemoveResultVm> {
    info!("{} removing reference year {}", caller.client, id);
    send(&state, reference_years::RemoveReferenceYearCommand { id }).await
}

// Evaluations

pub async fn list_evaluations(State(state): State<AppState>) -> ApiResult<Vec<EvaluationVm>> {
    send(&state, evaluations::ListEvaluationQuery).await
}

pub async fn list_evaluations_by_ids(
    State(state): State<AppState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Vec<EvaluationVm>> {
    send(&state, evaluations::ListEvaluationsByIdsQuery { ids }).await
}

pub async fn find_evaluation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ServiceError> {
    send_find(&state, evaluations::FindEvaluationByIdQuery { id }).await
}

pub async fn list_evaluations_by_vehicle(
    State(state): State<AppState>,
    ApiPath(vehicle_id): ApiPath<i64>,
) -> ApiResult<Vec<EvaluationVm>> {
    send(&state, evaluations::ListEvaluationByVehicleIdQuery { vehicle_id }).await
}

pub async fn create_evaluation(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiJson(vm): ApiJson<CreateEvaluationVm>,
) -> ApiResult<EvaluationVm> {
    send(&state, evaluations::CreateEvaluationCommand::from(vm)).await
}

pub async fn update_evaluation(
    _caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(vm): ApiJson<CreateEvaluationVm>,
) -> ApiResult<EvaluationVm> {
    send(&state, evaluations::UpdateEvaluationCommand::from_vm(id, vm)).await
}

pub async fn remove_evaluation(
    caller: Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RemoveResultVm> {
    info!("{} removing evaluation {}", caller.client, id);
    send(&state, evaluations::RemoveEvaluationCommand { id }).await
}
