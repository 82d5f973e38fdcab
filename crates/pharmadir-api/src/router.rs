//! Route table and server lifecycle.
//!
//! Layers, outermost first: panic catcher, then CORS on `/api` only.

use std::any::Any;
use std::net::SocketAddr;

use axum::Router;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::endpoints::{home, pharmacies, scrape, stats};
use crate::error::ApiError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // NOTE: Path params use `:param` syntax (axum 0.7).
    let api = Router::new()
        .route("/pharmacies", get(pharmacies::list))
        .route("/pharmacies/search", get(pharmacies::search))
        .route(
            "/pharmacies/:id",
            get(pharmacies::detail)
                .put(pharmacies::update)
                .delete(pharmacies::remove),
        )
        .route("/scrape", post(scrape::trigger))
        .route("/stats", get(stats::summary))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", get(home::banner))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(detail).into_response()
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "pharmacy API listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use pharmadir_core::{Candidate, Coordinates};
    use pharmadir_store::{DuckStore, StoreError};
    use pharmadir_sync::{
        CandidateSink, Collector, DEFAULT_CITY_SUFFIX, GeocodeBackend, GeocodeError, Geocoder,
        default_sources,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    struct Fixed;

    #[async_trait]
    impl GeocodeBackend for Fixed {
        async fn lookup(&self, _query: &str) -> Result<Option<Coordinates>, GeocodeError> {
            Ok(Some(Coordinates::new(5.34, -4.02)))
        }
    }

    /// Answers every lookup after a delay.
    struct Slow(Duration);

    #[async_trait]
    impl GeocodeBackend for Slow {
        async fn lookup(&self, _query: &str) -> Result<Option<Coordinates>, GeocodeError> {
            tokio::time::sleep(self.0).await;
            Ok(Some(Coordinates::new(5.34, -4.02)))
        }
    }

    struct RefusingSink;

    impl CandidateSink for RefusingSink {
        fn persist(&self, _candidates: &[Candidate]) -> Result<usize, StoreError> {
            Err(StoreError::Other("database is locked".into()))
        }
    }

    fn state_with(backend: Arc<dyn GeocodeBackend>) -> AppState {
        let geocoder = Geocoder::new(backend, DEFAULT_CITY_SUFFIX);
        AppState::new(
            DuckStore::open().unwrap(),
            Collector::new(default_sources(), geocoder),
        )
    }

    fn test_state() -> AppState {
        state_with(Arc::new(Fixed))
    }

    fn seeded_state() -> AppState {
        let state = test_state();
        state
            .store
            .lock()
            .unwrap()
            .reconcile(&[
                Candidate::new("Pharmacie Centrale", "Boulevard Roume, Plateau")
                    .with_phone("+22527229012"),
                Candidate::new("Pharmacie Saint-Jean", "Rue des Jardins, Cocody"),
                Candidate::new("Pharmacie du Port", "Port Autonome")
                    .with_email("port@pharma.ci"),
            ])
            .unwrap();
        state
    }

    fn id_of(state: &AppState, name: &str) -> i64 {
        state.store.lock().unwrap().find_by_name(name).unwrap().unwrap().id
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn banner_lists_endpoints() {
        let (status, json) = send(&test_state(), get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["endpoints"]["search"], "/api/pharmacies/search");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn list_paginates_and_sorts() {
        let state = seeded_state();
        let (status, json) = send(
            &state,
            get_req("/api/pharmacies?per_page=2&sort_by=name&order=desc"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        let names: Vec<_> = json["data"]["pharmacies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Pharmacie du Port", "Pharmacie Saint-Jean"]);

        let pagination = &json["data"]["pagination"];
        assert_eq!(pagination["total"], 3);
        assert_eq!(pagination["pages"], 2);
        assert_eq!(pagination["has_next"], true);
        assert_eq!(pagination["has_prev"], false);
    }

    #[tokio::test]
    async fn list_caps_per_page() {
        let (_, json) = send(&seeded_state(), get_req("/api/pharmacies?per_page=1000&page=abc")).await;
        assert_eq!(json["data"]["pagination"]["per_page"], 100);
        assert_eq!(json["data"]["pagination"]["page"], 1);
    }

    #[tokio::test]
    async fn search_matches_name_or_address_case_insensitively() {
        let state = seeded_state();
        let (status, json) = send(&state, get_req("/api/pharmacies/search?q=%20COCODY%20")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["search_term"], "COCODY");
        assert_eq!(json["data"]["pagination"]["total"], 1);
        assert_eq!(json["data"]["pharmacies"][0]["name"], "Pharmacie Saint-Jean");
    }

    #[tokio::test]
    async fn blank_search_is_rejected() {
        let state = seeded_state();
        for uri in ["/api/pharmacies/search", "/api/pharmacies/search?q=%20%20"] {
            let (status, json) = send(&state, get_req(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json["success"], false);
        }
    }

    #[tokio::test]
    async fn detail_found_and_missing() {
        let state = seeded_state();
        let id = id_of(&state, "Pharmacie Centrale");

        let (status, json) = send(&state, get_req(&format!("/api/pharmacies/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["phone"], "+22527229012");

        let (status, json) = send(&state, get_req("/api/pharmacies/999999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);

        let (status, _) = send(&state, get_req("/api/pharmacies/not-a-number")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_merges_partially() {
        let state = seeded_state();
        let id = id_of(&state, "Pharmacie Centrale");
        let uri = format!("/api/pharmacies/{id}");

        let (status, json) = send(&state, json_req("PUT", &uri, json!({"hours": "8h-20h"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["hours"], "8h-20h");
        assert_eq!(json["data"]["phone"], "+22527229012");
        assert_eq!(json["data"]["address"], "Boulevard Roume, Plateau");
    }

    #[tokio::test]
    async fn update_rejects_empty_body_and_unknown_id() {
        let state = seeded_state();
        let id = id_of(&state, "Pharmacie Centrale");
        let uri = format!("/api/pharmacies/{id}");

        let (status, _) = send(&state, json_req("PUT", &uri, json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let no_body = Request::builder()
            .method("PUT")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, no_body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&state, json_req("PUT", "/api/pharmacies/424242", json!({"hours": "24h/24"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_and_names_the_pharmacy() {
        let state = seeded_state();
        let id = id_of(&state, "Pharmacie du Port");
        let uri = format!("/api/pharmacies/{id}");

        let delete = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, delete).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["message"].as_str().unwrap().contains("Pharmacie du Port"));

        let (status, _) = send(&state, get_req(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.store.lock().unwrap().count().unwrap(), 2);
    }

    #[tokio::test]
    async fn scrape_runs_then_requires_force() {
        let state = test_state();

        let (status, json) = send(&state, json_req("POST", "/api/scrape", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["success"], true);
        assert_eq!(json["data"]["pharmacies_found"], 8);
        assert_eq!(json["data"]["pharmacies_saved"], 8);
        assert!(!state.run_guard.is_running());

        let (status, json) = send(&state, json_req("POST", "/api/scrape", json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Existing data");

        let (status, json) =
            send(&state, json_req("POST", "/api/scrape", json!({"force": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["pharmacies_saved"], 8);
        // Same names merge into the existing rows.
        assert_eq!(state.store.lock().unwrap().count().unwrap(), 8);
    }

    #[tokio::test]
    async fn scrape_while_running_is_rejected() {
        let state = test_state();
        let _ticket = state.run_guard.try_acquire().unwrap();

        let (status, json) =
            send(&state, json_req("POST", "/api/scrape", json!({"force": true}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Collection already in progress");
        assert_eq!(state.store.lock().unwrap().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_run_returns_500_with_summary() {
        let state = AppState {
            sink: Arc::new(RefusingSink),
            ..test_state()
        };

        let (status, json) = send(&state, json_req("POST", "/api/scrape", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "database is locked");
        let message = json["message"].as_str().unwrap();
        assert!(message.contains("8 pharmacies found"), "{message}");
        assert!(message.contains("none saved"), "{message}");

        assert_eq!(state.store.lock().unwrap().count().unwrap(), 0);
        assert!(!state.run_guard.is_running());
    }

    #[tokio::test]
    async fn run_survives_client_disconnect() {
        let state = state_with(Arc::new(Slow(Duration::from_millis(50))));

        // Eight lookups at 50 ms each outlast the client's patience.
        let request = build_router(state.clone())
            .oneshot(json_req("POST", "/api/scrape", json!({})));
        let outcome = tokio::time::timeout(Duration::from_millis(100), request).await;
        assert!(outcome.is_err(), "request should have been abandoned");
        assert!(state.run_guard.is_running());

        for _ in 0..100 {
            if !state.run_guard.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!state.run_guard.is_running());
        assert_eq!(state.store.lock().unwrap().count().unwrap(), 8);
    }

    #[tokio::test]
    async fn stats_counts_fields() {
        let (status, json) = send(&seeded_state(), get_req("/api/stats")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &json["data"];
        assert_eq!(data["total_pharmacies"], 3);
        assert_eq!(data["with_phone"], 1);
        assert_eq!(data["with_email"], 1);
        assert_eq!(data["with_coordinates"], 0);
        assert!(data["last_update"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_gets_envelope() {
        let state = test_state();
        for uri in ["/nope", "/api/nope"] {
            let (status, json) = send(&state, get_req(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(json["error"], "Endpoint not found");
        }
    }

    #[tokio::test]
    async fn api_allows_any_origin() {
        let request = Request::builder()
            .uri("/api/stats")
            .header(header::ORIGIN, "http://example.test")
            .body(Body::empty())
            .unwrap();
        let response = build_router(test_state()).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn panic_becomes_500_envelope() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
