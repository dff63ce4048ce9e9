use crate::config::ServerConfig;
use crate::server::handlers::*;
use crate::server::AppState;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderValue, Method, Request, Uri};
use axum::routing::{get, post};
use axum::Router;
use tower::util::MapRequest;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn};

/// The router wrapped so paths match regardless of case
pub type App = MapRequest<Router, fn(Request<Body>) -> Request<Body>>;

/// All routes, registered in lowercase
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let vehicles = Router::new()
        .route("/", get(list_vehicles).post(create_vehicle))
        .route("/listbyids", post(list_vehicles_by_ids))
        .route(
            "/:id",
            get(find_vehicle).put(update_vehicle).delete(remove_vehicle),
        )
        .route("/:id/:year", get(list_vehicles_by_reference_year))
        .route("/vehicle/:brand_id", get(list_vehicles_by_brand))
        .route("/model/:model_id", get(list_vehicles_by_model));

    let brands = Router::new()
        .route("/", get(list_brands).post(create_brand))
        .route("/listbyids", post(list_brands_by_ids))
        .route(
            "/:id",
            get(find_brand).put(update_brand).delete(remove_brand),
        );

    let models = Router::new()
        .route("/", get(list_models).post(create_model))
        .route("/listbyids", post(list_models_by_ids))
        .route(
            "/:id",
            get(find_model).put(update_model).delete(remove_model),
        )
        .route("/brand/:brand_id", get(list_models_by_brand));

    let reference_years = Router::new()
        .route("/", get(list_reference_years).post(create_reference_year))
        .route("/listbyids", post(list_reference_years_by_ids))
        .route(
            "/:id",
            get(find_reference_year)
                .put(update_reference_year)
                .delete(remove_reference_year),
        );

    let evaluations = Router::new()
        .route("/", get(list_evaluations).post(create_evaluation))
        .route("/listbyids", post(list_evaluations_by_ids))
        .route(
            "/:id",
            get(find_evaluation)
                .put(update_evaluation)
                .delete(remove_evaluation),
        )
        .route("/vehicle/:vehicle_id", get(list_evaluations_by_vehicle));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/vehicles", vehicles)
        .nest("/brands", brands)
        .nest("/models", models)
        .nest("/referenceyears", reference_years)
        .nest("/evaluations", evaluations)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        info_span!(
                            "http",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(&config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Router plus path normalization, ready to serve
pub fn create_app(state: AppState, config: &ServerConfig) -> App {
    ServiceBuilder::new()
        .map_request(lowercase_path as fn(Request<Body>) -> Request<Body>)
        .service(create_router(state, config))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Lowercase the path, leaving the query string alone
fn lowercase_path(mut request: Request<Body>) -> Request<Body> {
    let uri = request.uri();
    if !uri.path().bytes().any(|b| b.is_ascii_uppercase()) {
        return request;
    }

    let path = uri.path().to_ascii_lowercase();
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    let mut parts = uri.clone().into_parts();
    match PathAndQuery::try_from(path_and_query) {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(e) => {
            warn!("Could not normalize request path: {}", e);
            return request;
        }
    }
    match Uri::from_parts(parts) {
        Ok(lowered) => *request.uri_mut() = lowered,
        Err(e) => warn!("Could not normalize request path: {}", e),
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_of(uri: &str) -> String {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        lowercase_path(request).uri().to_string()
    }

    #[test]
    fn lowercases_path_but_not_query() {
        assert_eq!(path_of("/Vehicles/listByIds"), "/vehicles/listbyids");
        assert_eq!(path_of("/ReferenceYears?Name=X"), "/referenceyears?Name=X");
        assert_eq!(path_of("/vehicles/3"), "/vehicles/3");
    }
}
