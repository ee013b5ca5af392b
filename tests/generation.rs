use std::{collections::BTreeMap, sync::Arc, time::Duration};

use agromap::assemble::{AGRICULTURAL_AREA, TOTAL_AREA};
use agromap::geography::{BoundaryIndex, Municipality};
use agromap::jobs::{ArtifactPolicy, MapGenerationManager, MapGenerator};
use agromap::render::PngRenderer;
use agromap::stats::{LandTable, ProviderError, StatisticsProvider};
use agromap::web;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use geo_types::{polygon, MultiPolygon};
use tokio::{runtime::Handle, sync::Semaphore};
use tower::ServiceExt;

/// Serves fixed land statistics once the gate is opened.
struct GatedStatistics {
    gate: Semaphore,
}

#[async_trait]
impl StatisticsProvider for GatedStatistics {
    async fn latest_year(&self) -> Result<String, ProviderError> {
        Ok("2023".to_owned())
    }

    async fn indicators(&self) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(BTreeMap::from([
            (TOTAL_AREA.to_owned(), "Total area".to_owned()),
            (AGRICULTURAL_AREA.to_owned(), "Agricultural land".to_owned()),
        ]))
    }

    async fn municipality_codes(&self, names: &[String]) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(names
            .iter()
            .filter(|name| name.eq_ignore_ascii_case("devin"))
            .map(|name| (name.clone(), "SK0101528595".to_owned()))
            .collect())
    }

    async fn land_table(&self, codes: &[String]) -> Result<LandTable, ProviderError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ProviderError::Schema("closed".to_owned()))?;
        let rows = codes
            .iter()
            .enumerate()
            .map(|(i, code)| {
                let row = BTreeMap::from([
                    (TOTAL_AREA.to_owned(), Some(1000.0)),
                    (AGRICULTURAL_AREA.to_owned(), Some(100.0 * (i + 1) as f64)),
                ]);
                (code.clone(), row)
            })
            .collect();
        Ok(LandTable { year: "2023".to_owned(), rows })
    }
}

fn boundaries() -> BoundaryIndex {
    let codes = ["SK0101A", "SK0101B", "SK0101C", "SK0101D"];
    BoundaryIndex::from_municipalities(codes.iter().enumerate().map(|(i, code)| {
        let (x, y) = ((i % 2) as f64, (i / 2) as f64);
        let municipality = Municipality {
            code: (*code).to_owned(),
            name: format!("Obec <{code}>"),
            district_code: "SK0101".to_owned(),
            geometry: MultiPolygon(vec![polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
            ]]),
        };
        (municipality, "Bratislava I".to_owned())
    }))
}

fn app(output_dir: &std::path::Path) -> (Router, Arc<GatedStatistics>) {
    let statistics = Arc::new(GatedStatistics { gate: Semaphore::new(0) });
    let generator = MapGenerator::new(
        Arc::new(boundaries()),
        statistics.clone(),
        Arc::new(PngRenderer::new(200)),
        output_dir.to_owned(),
    );
    let manager = MapGenerationManager::new(Handle::current(), Arc::new(generator), ArtifactPolicy::SkipExisting);
    (web::router(Arc::new(manager)), statistics)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn post_form(body: &str) -> Request<Body> {
    Request::post("/generate_map")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn wait_for_status(app: &Router, query: &str, expected: &str) {
    for _ in 0..500 {
        let (_, body) = send(app, get(&format!("/map_status?{query}"))).await;
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        if body["status"] == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status for {query} never became {expected}");
}

#[tokio::test]
async fn generate_poll_and_fetch_map() {
    let dir = tempfile::tempdir().unwrap();
    let (app, statistics) = app(dir.path());
    let query = "district=SK0101&num_classes=5&color_palette=viridis";

    let (status, _) = send(&app, get("/map?district=SK0101&num_classes=5&color_palette=viridis")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, post_form(query)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap()["status"], "accepted");

    let (status, body) = send(&app, post_form(query)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap()["status"], "already processing");

    // a different class count is a different job
    let (status, _) = send(&app, post_form("district=SK0101&num_classes=3&color_palette=viridis")).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_status(&app, query, "Processing").await;
    statistics.gate.add_permits(16);
    wait_for_status(&app, query, "Completed").await;
    wait_for_status(&app, "district=SK0101&num_classes=3&color_palette=viridis", "Completed").await;

    let (status, body) = send(&app, get(&format!("/map?{query}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"\x89PNG"));
    assert!(dir.path().join("map_SK0101_5_viridis.png").exists());
    assert!(dir.path().join("map_SK0101_3_viridis.png").exists());
}

#[tokio::test]
async fn invalid_parameters_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path());

    for body in [
        "district=SK0101&num_classes=0&color_palette=viridis",
        "district=SK0101&num_classes=abc&color_palette=viridis",
        "district=SK0101&num_classes=5&color_palette=rainbow",
        "num_classes=5&color_palette=viridis",
    ] {
        let (status, response) = send(&app, post_form(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        let response: serde_json::Value = serde_json::from_slice(&response).unwrap();
        assert!(response["error"].is_string(), "{body}");
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn query_parameters_are_accepted_for_generation() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path());

    let request = Request::post("/generate_map?district=SK0101&num_classes=4&color_palette=GREENS")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_status(&app, "district=SK0101&num_classes=4&color_palette=Greens", "Processing").await;
}

#[tokio::test]
async fn districts_land_data_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let (app, statistics) = app(dir.path());
    statistics.gate.add_permits(16);

    let (status, body) = send(&app, get("/districts")).await;
    assert_eq!(status, StatusCode::OK);
    let districts: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(districts, serde_json::json!([{ "code": "SK0101", "name": "Bratislava I" }]));

    let (status, body) = send(&app, get("/land_data?district=SK0101")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Agricultural land (U14020)"));
    assert!(html.contains("Obec &lt;SK0101A&gt;"));
    assert!(html.contains("<td>10.00</td>"));

    let (status, _) = send(&app, get("/land_data?district=SK9999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/municipalities/search?name=Devin")).await;
    assert_eq!(status, StatusCode::OK);
    let found: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(found, serde_json::json!({ "name": "Devin", "code": "SK0101528595" }));

    let (status, _) = send(&app, get("/municipalities/search?name=Nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
