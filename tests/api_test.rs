use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use vehicles_service::app::build_mediator;
use vehicles_service::app::mediator::{Handler, Mediator};
use vehicles_service::app::vehicles::{ListVehicleByReferenceYearQuery, UpdateVehicleCommand};
use vehicles_service::auth::{token_digest, TokenVerifier};
use vehicles_service::config::{ApiToken, ServerConfig};
use vehicles_service::domain::FuelType;
use vehicles_service::error::Result;
use vehicles_service::server::{create_app, App, AppState};
use vehicles_service::storage::{InMemoryStorage, Storage};
use vehicles_service::view_models::VehicleVm;

const TOKEN: &str = "integration-secret";

fn verifier() -> TokenVerifier {
    TokenVerifier::from_config(&[ApiToken {
        name: "tests".to_string(),
        sha256: token_digest(TOKEN),
    }])
    .unwrap()
}

fn app_with(mediator: Mediator) -> App {
    create_app(AppState::new(mediator, verifier()), &ServerConfig::default())
}

fn catalog_app() -> (App, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    let mediator = build_mediator(storage.clone()).unwrap();
    (app_with(mediator), storage)
}

struct Sent {
    method: Method,
    uri: &'static str,
    body: Option<Value>,
    authorization: Option<String>,
}

impl Sent {
    fn get(uri: &'static str) -> Self {
        Self {
            method: Method::GET,
            uri,
            body: None,
            authorization: None,
        }
    }

    fn write(method: Method, uri: &'static str, body: Option<Value>) -> Self {
        Self {
            method,
            uri,
            body,
            authorization: Some(format!("Bearer {TOKEN}")),
        }
    }

    fn anonymous(mut self) -> Self {
        self.authorization = None;
        self
    }
}

async fn call(app: &App, sent: Sent) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(sent.method).uri(sent.uri);
    if let Some(authorization) = &sent.authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    let body = match sent.body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// Brand 1 Fiat, model 1 Argo, reference year 1 (301/2024)
async fn seed(app: &App) {
    let steps = [
        (Method::POST, "/Brands", json!({ "name": "Fiat" })),
        (Method::POST, "/Models", json!({ "brandId": 1, "name": "Argo" })),
        (
            Method::POST,
            "/ReferenceYears",
            json!({ "priceReferenceNumber": 301, "year": 2024, "description": "jan/2024" }),
        ),
    ];
    for (method, uri, body) in steps {
        let (status, value) = call(app, Sent::write(method, uri, Some(body))).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {value}");
    }
}

fn argo(price: f64) -> Value {
    json!({
        "brandId": 1,
        "modelId": 1,
        "referenceYearId": 1,
        "modelYear": 2022,
        "fuel": "flex",
        "fipeCode": "001004-9",
        "price": price
    })
}

#[tokio::test]
async fn vehicle_routes_round_trip_through_storage() {
    let (app, _) = catalog_app();
    seed(&app).await;

    let (status, created) =
        call(&app, Sent::write(Method::POST, "/Vehicles", Some(argo(78_900.0)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        created,
        json!({
            "id": 1,
            "brandId": 1,
            "brandName": "Fiat",
            "modelId": 1,
            "modelName": "Argo",
            "referenceYearId": 1,
            "priceReferenceNumber": 301,
            "referenceYear": 2024,
            "modelYear": 2022,
            "fuel": "flex",
            "fipeCode": "001004-9",
            "price": 78900.0
        })
    );

    let (status, found) = call(&app, Sent::get("/vehicles/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found, created);

    for uri in ["/Vehicles", "/Vehicles/301/2024", "/Vehicles/vehicle/1", "/Vehicles/model/1"] {
        let (status, list) = call(&app, Sent::get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(list, json!([created.clone()]), "{uri}");
    }

    let (_, other_table) = call(&app, Sent::get("/Vehicles/301/2023")).await;
    assert_eq!(other_table, json!([]));

    let (status, updated) =
        call(&app, Sent::write(Method::PUT, "/Vehicles/1", Some(argo(75_000.0)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], json!(75000.0));

    let (status, removed) = call(&app, Sent::write(Method::DELETE, "/Vehicles/1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        removed,
        json!({ "id": 1, "success": true, "message": "vehicle 1 removed" })
    );
}

#[tokio::test]
async fn missing_single_item_is_no_content() {
    let (app, _) = catalog_app();
    for uri in [
        "/Vehicles/42",
        "/Brands/42",
        "/Models/42",
        "/ReferenceYears/42",
        "/Evaluations/42",
    ] {
        let (status, body) = call(&app, Sent::get(uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "{uri}");
        assert_eq!(body, Value::Null);
    }
}

#[tokio::test]
async fn list_by_ids_is_a_public_read() {
    let (app, _) = catalog_app();
    seed(&app).await;
    for price in [10_000.0, 20_000.0, 30_000.0] {
        call(&app, Sent::write(Method::POST, "/Vehicles", Some(argo(price)))).await;
    }

    let request = Sent::write(Method::POST, "/Vehicles/listByIds", Some(json!([3, 1, 3, 77])));
    let (status, list) = call(&app, request.anonymous()).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);

    let (_, empty) = call(&app, Sent::write(Method::POST, "/Brands/listByIds", Some(json!([])))).await;
    assert_eq!(empty, json!([]));
}

#[tokio::test]
async fn writes_require_a_valid_bearer_token() {
    let (app, storage) = catalog_app();

    let missing = Sent::write(Method::POST, "/Brands", Some(json!({ "name": "Ford" }))).anonymous();
    let (status, _) = call(&app, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut wrong = Sent::write(Method::POST, "/Brands", Some(json!({ "name": "Ford" })));
    wrong.authorization = Some("Bearer not-the-token".to_string());
    assert_eq!(call(&app, wrong).await.0, StatusCode::UNAUTHORIZED);

    // Auth is checked before the body is parsed
    let malformed = Sent::write(Method::PUT, "/Vehicles/1", Some(json!("not a vehicle"))).anonymous();
    assert_eq!(call(&app, malformed).await.0, StatusCode::UNAUTHORIZED);

    let delete = Sent::write(Method::DELETE, "/Evaluations/1", None).anonymous();
    assert_eq!(call(&app, delete).await.0, StatusCode::UNAUTHORIZED);

    assert!(storage.list_brands().await.unwrap().is_empty());
}

#[tokio::test]
async fn unauthorized_response_challenges_for_bearer() {
    let (app, _) = catalog_app();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/brands/1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn invalid_input_gets_validation_problem_body() {
    let (app, _) = catalog_app();

    let (status, body) =
        call(&app, Sent::write(Method::POST, "/Brands", Some(json!({ "name": "  " })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "One or more validation errors occurred.");
    assert_eq!(body["status"], 400);
    assert_eq!(body["errors"]["name"], json!(["must not be empty"]));

    let (status, body) =
        call(&app, Sent::write(Method::POST, "/Brands", Some(json!({ "title": "x" })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["body"].is_array());

    let (status, body) = call(&app, Sent::get("/Vehicles/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["path"].is_array());

    seed(&app).await;
    let mut bad = argo(-5.0);
    bad["fipeCode"] = json!("1004-9");
    let (status, body) = call(&app, Sent::write(Method::POST, "/Vehicles", Some(bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&String> = body["errors"].as_object().unwrap().keys().collect();
    assert_eq!(fields, ["fipeCode", "price"]);
}

#[tokio::test]
async fn unknown_ids_and_duplicates_map_to_404_and_409() {
    let (app, _) = catalog_app();
    seed(&app).await;

    let (status, body) =
        call(&app, Sent::write(Method::PUT, "/Brands/9", Some(json!({ "name": "Kia" })))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!("brand 9 not found"));

    let (status, _) = call(&app, Sent::write(Method::DELETE, "/Models/9", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        call(&app, Sent::write(Method::POST, "/Brands", Some(json!({ "name": "FIAT" })))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Brand 1 still has model 1
    let (status, _) = call(&app, Sent::write(Method::DELETE, "/Brands/1", None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn evaluations_report_difference_from_catalog_price() {
    let (app, _) = catalog_app();
    seed(&app).await;
    call(&app, Sent::write(Method::POST, "/Vehicles", Some(argo(80_000.0)))).await;

    let today = chrono::Utc::now().date_naive().to_string();
    let body = json!({
        "vehicleId": 1,
        "evaluatedPrice": 82_500.0,
        "evaluatedOn": today,
        "evaluator": "Carla"
    });
    let (status, created) =
        call(&app, Sent::write(Method::POST, "/Evaluations", Some(body))).await;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["referencePrice"], json!(80000.0));
    assert_eq!(created["priceDifference"], json!(2500.0));
    assert_eq!(created["fipeCode"], "001004-9");

    let (_, by_vehicle) = call(&app, Sent::get("/Evaluations/vehicle/1")).await;
    assert_eq!(by_vehicle, json!([created]));

    // An evaluated vehicle cannot be removed
    let (status, _) = call(&app, Sent::write(Method::DELETE, "/Vehicles/1", None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn health_and_disabled_metrics() {
    let (app, _) = catalog_app();
    let (status, body) = call(&app, Sent::get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["handlers"], 35);

    let (status, _) = call(&app, Sent::get("/metrics")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (app, _) = catalog_app();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

/// Records what the routes hand to the mediator
#[derive(Default)]
struct Recorder {
    reference_queries: Mutex<Vec<ListVehicleByReferenceYearQuery>>,
    updates: Mutex<Vec<UpdateVehicleCommand>>,
}

#[async_trait]
impl Handler<ListVehicleByReferenceYearQuery> for Recorder {
    async fn handle(&self, query: ListVehicleByReferenceYearQuery) -> Result<Vec<VehicleVm>> {
        self.reference_queries.lock().unwrap().push(query);
        Ok(Vec::new())
    }
}

#[async_trait]
impl Handler<UpdateVehicleCommand> for Recorder {
    async fn handle(&self, command: UpdateVehicleCommand) -> Result<VehicleVm> {
        let vehicle = &command.vehicle;
        let vm = VehicleVm {
            id: command.id,
            brand_id: vehicle.brand_id,
            brand_name: String::new(),
            model_id: vehicle.model_id,
            model_name: String::new(),
            reference_year_id: vehicle.reference_year_id,
            price_reference_number: 0,
            reference_year: 0,
            model_year: vehicle.model_year,
            fuel: vehicle.fuel,
            fipe_code: vehicle.fipe_code.clone(),
            price: vehicle.price,
        };
        self.updates.lock().unwrap().push(command);
        Ok(vm)
    }
}

#[tokio::test]
async fn routes_forward_parameters_unchanged() {
    let recorder = Arc::new(Recorder::default());
    let mediator = Mediator::builder()
        .register::<ListVehicleByReferenceYearQuery, _>(recorder.clone())
        .register::<UpdateVehicleCommand, _>(recorder.clone())
        .build()
        .unwrap();
    let app = app_with(mediator);

    let (status, _) = call(&app, Sent::get("/VEHICLES/315/2025")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        *recorder.reference_queries.lock().unwrap(),
        vec![ListVehicleByReferenceYearQuery {
            price_reference_number: 315,
            year: 2025,
        }]
    );

    let mut body = argo(1234.5);
    body["fuel"] = json!("electric");
    let (status, _) = call(&app, Sent::write(Method::PUT, "/Vehicles/88", Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    {
        let updates = recorder.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id, 88);
        assert_eq!(updates[0].vehicle.fuel, FuelType::Electric);
        assert_eq!(updates[0].vehicle.price, 1234.5);
    }

    // Nothing registered for plain listing
    let (status, _) = call(&app, Sent::get("/Vehicles")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
