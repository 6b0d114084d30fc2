//! The recipes service end to end, against the workspace contract.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use switchyard_config::RuntimeConfig;
use switchyard_core::{Contract, DocumentFormat, SchemaRegistry};
use switchyard_gateway::Gateway;
use switchyard_recipes::{InMemoryPersistence, RecipeStore};
use switchyard_service::{HttpResponse, ServiceRuntime};
use switchyard_telemetry::{MemorySink, TRACE_ID_HEADER};
use tokio::net::TcpListener;

const CONTRACT_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contract.yaml");

struct Harness {
    runtime: ServiceRuntime,
    persistence: Arc<InMemoryPersistence>,
    sink: Arc<MemorySink>,
}

fn harness() -> Harness {
    let contract = Contract::load(CONTRACT_PATH, &SchemaRegistry::new()).unwrap();
    let persistence = Arc::new(InMemoryPersistence::new(Arc::new(RecipeStore::new())));
    let sink = MemorySink::new();
    let runtime =
        switchyard_recipes::runtime(&contract, Arc::clone(&persistence), sink.clone()).unwrap();
    Harness {
        runtime,
        persistence,
        sink,
    }
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Bytes> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(body.to_string()))
            .unwrap(),
        None => builder.body(Bytes::new()).unwrap(),
    }
}

async fn call(h: &Harness, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response: HttpResponse = h.runtime.handle(request(method, uri, body)).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn soup() -> Value {
    json!({
        "title": "Tomato Soup",
        "description": "Warm and red",
        "ingredients": [
            {"name": "tomato", "qty": 4, "unit": "pc"},
            {"name": "salt", "qty": 1, "unit": "pinch"}
        ],
        "steps": ["Chop", "Simmer"]
    })
}

fn named(title: &str, ingredient: &str) -> Value {
    json!({
        "title": title,
        "ingredients": [{"name": ingredient, "qty": 100, "unit": "g"}]
    })
}

#[tokio::test]
async fn crud_round_trip() {
    let h = harness();

    let (status, created) = call(&h, Method::POST, "/recipes", Some(soup())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["normalized_title"], "tomato soup");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = call(&h, Method::GET, &format!("/recipes/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = call(
        &h,
        Method::PUT,
        &format!("/recipes/{id}"),
        Some(json!({"title": "Roasted Tomato Soup", "steps": ["Roast", "Blend"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["normalized_title"], "roasted tomato soup");
    assert_eq!(updated["description"], "Warm and red");
    assert_eq!(updated["steps"], json!(["Roast", "Blend"]));

    let (status, deleted) = call(&h, Method::DELETE, &format!("/recipes/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"success": true}));

    let (status, missing) = call(&h, Method::GET, &format!("/recipes/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"]["code"], "RECIPE_NOT_FOUND");

    assert_eq!(h.persistence.outstanding(), 0);
    assert!(h.sink.named("response_schema_mismatch").is_empty());
}

#[tokio::test]
async fn handler_and_store_spans_nest() {
    let h = harness();
    let response = h
        .runtime
        .handle(
            Request::builder()
                .method(Method::POST)
                .uri("/recipes")
                .header(TRACE_ID_HEADER, "abc-123")
                .header(CONTENT_TYPE, "application/json")
                .body(Bytes::from(soup().to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()[TRACE_ID_HEADER], "abc-123");

    let names: Vec<String> = h
        .sink
        .events()
        .into_iter()
        .filter(|e| e.trace_id.as_deref() == Some("abc-123"))
        .map(|e| e.event)
        .collect();
    assert_eq!(
        names,
        [
            "span_start_recipes.create_recipe",
            "span_start_db_create_recipe",
            "span_end_db_create_recipe",
            "span_end_recipes.create_recipe",
            "request",
        ]
    );
}

#[tokio::test]
async fn invalid_body_never_reaches_the_store() {
    let h = harness();

    let (status, body) = call(&h, Method::POST, "/recipes", Some(named("x", "salt"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"]["field"], "$.title");

    let (status, body) = call(
        &h,
        Method::POST,
        "/recipes",
        Some(json!({"title": "Dry", "ingredients": [{"name": "sand", "qty": 0, "unit": "g"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"]["field"], "$.ingredients[0].qty");

    assert!(h.persistence.store().is_empty());
    assert_eq!(h.persistence.outstanding(), 0);
}

#[tokio::test]
async fn duplicate_titles_are_rejected() {
    let h = harness();
    call(&h, Method::POST, "/recipes", Some(soup())).await;

    let (status, body) =
        call(&h, Method::POST, "/recipes", Some(named(" TOMATO SOUP ", "water"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DUPLICATE_RECIPE");
    assert_eq!(h.persistence.store().len(), 1);
}

#[tokio::test]
async fn listing_filters_sorts_and_paginates() {
    let h = harness();
    for (title, ingredient) in [
        ("Tomato Soup", "tomato"),
        ("Apple Pie", "apple"),
        ("Tomato Salad", "basil"),
        ("Basil Pesto", "basil"),
    ] {
        let (status, _) = call(&h, Method::POST, "/recipes", Some(named(title, ingredient))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = call(&h, Method::GET, "/recipes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 4);
    assert_eq!(page["limit"], 20);
    assert_eq!(page["offset"], 0);

    let (_, page) = call(&h, Method::GET, "/recipes?search=tomato&sort=title:desc", None).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["data"][0]["title"], "Tomato Soup");

    let (_, page) = call(&h, Method::GET, "/recipes?ingredient=BASIL", None).await;
    assert_eq!(page["total"], 2);

    let (_, page) = call(&h, Method::GET, "/recipes?sort=title:asc&limit=2&offset=1", None).await;
    assert_eq!(page["total"], 4);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["title"], "Basil Pesto");
}

#[tokio::test]
async fn listing_rejects_bad_parameters() {
    let h = harness();

    let (status, _) = call(&h, Method::GET, "/recipes?limit=0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&h, Method::GET, "/recipes?limit=101", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&h, Method::GET, "/recipes?offset=ten", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&h, Method::GET, "/recipes?sort=rating:asc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_SORT");

    assert_eq!(h.persistence.outstanding(), 0);
}

#[tokio::test]
async fn closed_store_is_unavailable() {
    let h = harness();
    h.persistence.close();

    let (status, body) = call(&h, Method::GET, "/recipes", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");
}

#[tokio::test]
async fn through_the_gateway() {
    let backend_sink = MemorySink::new();
    let contract = Contract::load(CONTRACT_PATH, &SchemaRegistry::new()).unwrap();
    let persistence = Arc::new(InMemoryPersistence::new(Arc::new(RecipeStore::new())));
    let backend = switchyard_recipes::runtime(&contract, persistence, backend_sink.clone()).unwrap();

    let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend_listener.local_addr().unwrap();
    let (stop_backend, backend_stopped) = tokio::sync::oneshot::channel::<()>();
    let backend_task = tokio::spawn(backend.serve(backend_listener, async {
        let _ = backend_stopped.await;
    }));

    let document = std::fs::read_to_string(CONTRACT_PATH)
        .unwrap()
        .replace("http://localhost:8001", &format!("http://{backend_addr}"));
    let routed = Contract::parse(&document, DocumentFormat::Yaml, &SchemaRegistry::new()).unwrap();
    let gateway_sink = MemorySink::new();
    let gateway = Gateway::new(&routed, &RuntimeConfig::default(), gateway_sink.clone()).unwrap();

    let gateway_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway_addr = gateway_listener.local_addr().unwrap();
    let (stop_gateway, gateway_stopped) = tokio::sync::oneshot::channel::<()>();
    let gateway_task = tokio::spawn(gateway.serve(gateway_listener, async {
        let _ = gateway_stopped.await;
    }));

    let client = reqwest::Client::new();
    let created = client
        .post(format!("http://{gateway_addr}/api/v1/recipes"))
        .header(TRACE_ID_HEADER, "e2e-1")
        .json(&soup())
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);
    assert_eq!(created.headers()[TRACE_ID_HEADER], "e2e-1");
    let created: Value = created.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let fetched = client
        .get(format!("http://{gateway_addr}/api/v1/recipes/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), reqwest::StatusCode::OK);
    let trace = fetched.headers()[TRACE_ID_HEADER].to_str().unwrap().to_string();
    assert!(!trace.starts_with("LOCAL-"));
    let fetched: Value = fetched.json().await.unwrap();
    assert_eq!(fetched["title"], "Tomato Soup");

    // Both hops logged the same trace ids.
    for trace_id in ["e2e-1", trace.as_str()] {
        let seen_by = |sink: &MemorySink, event: &str| {
            sink.named(event)
                .iter()
                .any(|e| e.trace_id.as_deref() == Some(trace_id))
        };
        assert!(seen_by(&*gateway_sink, "gateway_request"), "gateway missed {trace_id}");
        assert!(seen_by(&*backend_sink, "request"), "backend missed {trace_id}");
    }

    stop_gateway.send(()).unwrap();
    stop_backend.send(()).unwrap();
    let gateway_outcome = tokio::time::timeout(Duration::from_secs(5), gateway_task).await.unwrap();
    assert!(gateway_outcome.unwrap().is_ok());
    let backend_outcome = tokio::time::timeout(Duration::from_secs(5), backend_task).await.unwrap();
    assert!(backend_outcome.unwrap().is_ok());
}
