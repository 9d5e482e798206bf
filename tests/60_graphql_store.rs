use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use agency_office::database::{EntityStore, GraphqlStore, StoreError};
use agency_office::entity::registry::{CITIES, COUNTRIES, DEGREES};
use agency_office::filter::{Filter, FilterWhere};
use agency_office::graphql::{GraphqlClient, GraphqlError};

/// Headers and body of one call the backend received
#[derive(Debug, Clone)]
struct Seen {
    apikey: Option<String>,
    authorization: Option<String>,
    body: Value,
}

type Calls = Arc<Mutex<Vec<Seen>>>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn row(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "created_at": "2024-03-01T10:00:00+00:00",
        "updated_at": "2024-03-01T10:00:00+00:00",
        "name": name,
        "country_code": "TL",
        "active_on_nationalities": true,
        "active_on_university": true
    })
}

/// Answers the generated-schema documents the store sends
async fn graphql(State(calls): State<Calls>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Ok(mut calls) = calls.lock() {
        calls.push(Seen {
            apikey: header(&headers, "apikey"),
            authorization: header(&headers, "authorization"),
            body: body.clone(),
        });
    }
    let query = body["query"].as_str().unwrap_or_default();
    let targets_missing = body["variables"]["filter"]["id"]["eq"] == json!("missing");

    if query.contains("degreesCollection") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    if query.contains("citiesCollection") {
        return Json(json!({ "data": null, "errors": [{ "message": "permission denied for table cities" }] }))
            .into_response();
    }

    let data = if query.contains("insertIntocountriesCollection") {
        let mut created = body["variables"]["objects"][0].clone();
        created["id"] = json!("c-new");
        created["created_at"] = json!("2024-03-02T09:00:00+00:00");
        created["updated_at"] = json!("2024-03-02T09:00:00+00:00");
        json!({ "insertIntocountriesCollection": { "records": [created] } })
    } else if query.contains("updatecountriesCollection") {
        let records = if targets_missing { vec![] } else { vec![row("c1", "Renamed")] };
        json!({ "updatecountriesCollection": { "records": records } })
    } else if query.contains("deleteFromcountriesCollection") {
        let records = if targets_missing { vec![] } else { vec![json!({ "id": "c1" })] };
        json!({ "deleteFromcountriesCollection": { "records": records } })
    } else if query.contains("countriesCollection") {
        json!({
            "countriesCollection": {
                "totalCount": 42,
                "edges": [ { "node": row("c1", "Testland") }, { "node": row("c2", "Otherland") } ]
            }
        })
    } else {
        json!({ "__typename": "Query" })
    };
    Json(json!({ "data": data })).into_response()
}

/// Stand-in for the hosted GraphQL endpoint
async fn spawn_backend() -> Result<(GraphqlStore, Calls)> {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/graphql/v1", post(graphql)).with_state(calls.clone());

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = GraphqlClient::new(
        reqwest::Client::new(),
        &format!("http://127.0.0.1:{}/graphql/v1", port),
        "anon-key",
        "service-key",
    )?;
    Ok((GraphqlStore::new(client), calls))
}

fn last_call(calls: &Calls) -> Seen {
    calls.lock().unwrap().last().cloned().unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn list_reads_edges_and_total_count() -> Result<()> {
    let (store, calls) = spawn_backend().await?;
    let mut filter = Filter::new("countries")?;
    filter.where_clause(FilterWhere::eq("active_on_university", true));
    filter.limit(2, Some(4))?;

    let page = store.list(&COUNTRIES, &filter).await?;
    assert_eq!(page.total_count, 42);
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].id, "c1");
    assert_eq!(page.records[1].str_field("name"), Some("Otherland"));
    assert!(page.records[0].created_at.is_some());

    let seen = last_call(&calls);
    assert_eq!(seen.apikey.as_deref(), Some("anon-key"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer service-key"));
    assert_eq!(seen.body["variables"]["first"], json!(2));
    assert_eq!(seen.body["variables"]["offset"], json!(4));
    assert_eq!(seen.body["variables"]["filter"], json!({ "active_on_university": { "eq": true } }));
    Ok(())
}

#[tokio::test]
async fn insert_returns_the_created_row() -> Result<()> {
    let (store, calls) = spawn_backend().await?;
    let record = store
        .create(&COUNTRIES, object(json!({ "name": "Newland", "country_code": "NL" })))
        .await?;
    assert_eq!(record.id, "c-new");
    assert_eq!(record.str_field("name"), Some("Newland"));

    let seen = last_call(&calls);
    assert_eq!(seen.body["variables"]["objects"], json!([{ "name": "Newland", "country_code": "NL" }]));
    Ok(())
}

#[tokio::test]
async fn system_fields_never_reach_the_backend() -> Result<()> {
    let (store, calls) = spawn_backend().await?;
    let err = store.create(&COUNTRIES, object(json!({ "id": "forged", "name": "X" }))).await.unwrap_err();
    assert!(!matches!(err, StoreError::Graphql(_)));
    assert!(calls.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn update_and_delete_report_missing_rows() -> Result<()> {
    let (store, _) = spawn_backend().await?;

    let updated = store.update(&COUNTRIES, "c1", object(json!({ "name": "Renamed" }))).await?;
    assert_eq!(updated.str_field("name"), Some("Renamed"));
    store.delete(&COUNTRIES, "c1").await?;

    let err = store.update(&COUNTRIES, "missing", object(json!({ "name": "Nope" }))).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref id, .. } if id == "missing"));
    let err = store.delete(&COUNTRIES, "missing").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn error_list_surfaces_messages() -> Result<()> {
    let (store, _) = spawn_backend().await?;
    let err = store.list(&CITIES, &Filter::new("cities")?).await.unwrap_err();
    match err {
        StoreError::Graphql(GraphqlError::Response(message)) => {
            assert_eq!(message, "permission denied for table cities")
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn http_failure_keeps_status_and_body() -> Result<()> {
    let (store, _) = spawn_backend().await?;
    let err = store.list(&DEGREES, &Filter::new("degrees")?).await.unwrap_err();
    match err {
        StoreError::Graphql(GraphqlError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn ping_and_get_go_through_the_endpoint() -> Result<()> {
    let (store, calls) = spawn_backend().await?;
    store.ping().await?;
    assert!(last_call(&calls).body["query"].as_str().unwrap().contains("__typename"));

    let record = store.get_404(&COUNTRIES, "c1").await?;
    assert_eq!(record.id, "c1");
    let seen = last_call(&calls);
    assert_eq!(seen.body["variables"]["filter"], json!({ "id": { "eq": "c1" } }));
    assert_eq!(seen.body["variables"]["first"], json!(1));
    Ok(())
}
