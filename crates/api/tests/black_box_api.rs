use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use wattcast_auth::{BuildingScope, Permission, Principal};
use wattcast_infra::{AccessConfig, ServiceConfig};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(config: ServiceConfig) -> Self {
        // Same router as prod, seeded with the demo buildings, on an ephemeral port.
        let services = Arc::new(wattcast_api::app::build_services(config).expect("services"));
        let app = wattcast_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn default() -> Self {
        Self::spawn(ServiceConfig::default()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post_forecast(client: &reqwest::Client, srv: &TestServer, body: serde_json::Value) -> reqwest::Response {
    client
        .post(format!("{}/forecast", srv.base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_endpoints_report_the_registry() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/health/details", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["models_registered"], 6);
    assert_eq!(body["models_active"], 6);
}

#[tokio::test]
async fn day_ahead_forecast_round_trip() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B001", "horizon": "24H", "requested_by": "ops" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let forecast = &body;
    assert_eq!(forecast["predicted_series"].as_array().unwrap().len(), 24);
    assert_eq!(forecast["algorithm"], "LSTM");
    assert!(body.get("optimization").is_none());

    let id = forecast["id"].as_str().unwrap();
    let res = client
        .get(format!("{}/forecast/{}", srv.base_url, id))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stored: serde_json::Value = res.json().await.unwrap();
    assert_eq!(stored["id"], forecast["id"]);

    let res = client
        .get(format!("{}/forecast/latest/B001?horizon=24H&forecast_type=energy_demand", srv.base_url))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let latest: serde_json::Value = res.json().await.unwrap();
    assert_eq!(latest["id"], forecast["id"]);
}

#[tokio::test]
async fn cost_forecast_includes_recommendations() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B002", "horizon": "24H", "forecast_type": "cost", "requested_by": "ops" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["forecast_type"], "cost");
    assert_eq!(body["optimization"]["currency"], "PLN");
}

#[tokio::test]
async fn invalid_input_is_a_bad_request() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B001", "horizon": "3D", "requested_by": "ops" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(format!("{}/optimization", srv.base_url))
        .json(&json!({ "building_id": "B001", "requested_by": "ops", "time_range_hours": 500 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_building_is_not_found() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B404", "horizon": "24H", "requested_by": "ops" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn optimization_returns_ranked_recommendations() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/optimization", srv.base_url))
        .json(&json!({ "building_id": "B001", "requested_by": "ops", "time_range_hours": 24 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let recs = body["recommendations"].as_array().unwrap();
    assert!(!recs.is_empty());
    let savings: Vec<f64> = recs
        .iter()
        .map(|r| r["estimated_savings"].as_f64().unwrap())
        .collect();
    assert!(savings.windows(2).all(|w| w[0] >= w[1]));
    assert!(savings.iter().all(|s| *s >= 0.0));
    assert_eq!(recs[0]["action"]["type"], "load_shift");
}

#[tokio::test]
async fn identified_endpoints_require_a_requester() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/models/performance?building_id=B001&algorithm=LSTM", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn model_lifecycle_over_http() {
    let srv = TestServer::default().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/models/performance?building_id=B001&algorithm=LSTM", srv.base_url))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    assert_eq!(report["health"], "healthy");
    let model_id = report["model_id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/models/{}/performance", srv.base_url, model_id))
        .header("x-requested-by", "ops")
        .json(&json!({ "mae": 3.0, "rmse": 5.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/models/{}/retire", srv.base_url, model_id))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let retired: serde_json::Value = res.json().await.unwrap();
    assert_eq!(retired["status"], "retired");

    // No active day-ahead model left for B001.
    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B001", "horizon": "24H", "requested_by": "ops" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .post(format!("{}/models/{}/promote", srv.base_url, model_id))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/models?building_id=B001", srv.base_url))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let res = client
        .post(format!("{}/models/not-a-uuid/promote", srv.base_url))
        .header("x-requested-by", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn access_policy_limits_buildings() {
    let config = ServiceConfig {
        access: AccessConfig {
            principals: vec![Principal::new(
                "north-team",
                BuildingScope::Only(["B002".parse().unwrap()].into_iter().collect()),
                vec![Permission::FORECAST_REQUEST, Permission::OPTIMIZATION_REQUEST],
            )],
        },
        ..ServiceConfig::default()
    };
    let srv = TestServer::spawn(config).await;
    let client = reqwest::Client::new();

    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B001", "horizon": "24H", "requested_by": "north-team" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = post_forecast(
        &client,
        &srv,
        json!({ "building_id": "B002", "horizon": "24H", "requested_by": "north-team" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
}
