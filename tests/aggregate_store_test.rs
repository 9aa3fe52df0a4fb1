use anyhow::Result;
use consignment_desk::domain::model::ConsignmentStatus;
use consignment_desk::{ConsignmentStore, Credential, DeskError, RestBackend};
use httpmock::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn store_for(server: &MockServer) -> Result<ConsignmentStore<RestBackend>> {
    let backend = RestBackend::new(&server.base_url())?;
    Ok(ConsignmentStore::new(Arc::new(backend)))
}

fn patch(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test]
async fn test_update_keeps_unrelated_sections() -> Result<()> {
    let server = MockServer::start();
    let credential = Credential::bearer("token-1");

    let read = server.mock(|when, then| {
        when.method(GET)
            .path("/consignment/5")
            .header("authorization", "Bearer token-1");
        then.status(200).json_body(json!({
            "id": 5,
            "date": "2024-03-01",
            "status": "Pending",
            "trader": {"id": 2, "name": "Acme Exports"}
        }));
    });

    // 寫回整筆紀錄：trader 保留，consignee 新增，status 更新
    let write = server.mock(|when, then| {
        when.method(PUT).path("/consignment/5").json_body(json!({
            "id": 5,
            "date": "2024-03-01",
            "status": "Custom Cleared",
            "trader": {"id": 2, "name": "Acme Exports"},
            "consignee": {"id": 3, "name": "Northwind"}
        }));
        then.status(200);
    });

    let store = store_for(&server)?;
    let updated = store
        .update_consignment(
            5,
            patch(json!({"consignee": {"id": 3, "name": "Northwind"}})),
            Some(ConsignmentStatus::CustomCleared),
            &credential,
        )
        .await?;

    read.assert();
    write.assert();
    assert_eq!(updated["status"], "Custom Cleared");
    assert_eq!(updated["trader"]["name"], "Acme Exports");
    assert_eq!(updated["consignee"]["id"], 3);
    Ok(())
}

#[tokio::test]
async fn test_missing_consignment_is_not_found_and_nothing_is_written() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/consignment/404");
        then.status(404);
    });
    let write = server.mock(|when, then| {
        when.method(PUT).path("/consignment/404");
        then.status(200);
    });

    let store = store_for(&server)?;
    let result = store
        .update_consignment(
            404,
            patch(json!({"packing": {"id": 1}})),
            None,
            &Credential::bearer("t"),
        )
        .await;

    assert!(matches!(result, Err(DeskError::NotFound { .. })));
    write.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_rejected_write_is_a_persistence_error() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/consignment/8");
        then.status(200)
            .json_body(json!({"id": 8, "status": "Not started"}));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/consignment/8");
        then.status(500).body("database unavailable");
    });

    let store = store_for(&server)?;
    let result = store
        .update_consignment(
            8,
            patch(json!({"trader": {"id": 1, "name": "T"}})),
            None,
            &Credential::bearer("t"),
        )
        .await;

    match result {
        Err(DeskError::Persistence {
            status, message, ..
        }) => {
            assert_eq!(status, 500);
            assert!(message.contains("database unavailable"));
        }
        other => panic!("expected persistence error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_optimistic_write_sends_if_match_and_maps_conflict() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/consignment/11");
        then.status(200)
            .header("ETag", "\"v7\"")
            .json_body(json!({"id": 11, "status": "Pending"}));
    });
    let write = server.mock(|when, then| {
        when.method(PUT)
            .path("/consignment/11")
            .header("if-match", "\"v7\"");
        then.status(412);
    });

    let store = store_for(&server)?.with_optimistic_concurrency(true);
    let result = store
        .update_consignment(
            11,
            patch(json!({"airwayBill": {"number": "AWB-11"}})),
            None,
            &Credential::bearer("t"),
        )
        .await;

    write.assert();
    assert!(matches!(result, Err(DeskError::Conflict { .. })));
    Ok(())
}

#[tokio::test]
async fn test_rejected_credential_is_session_expired() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/consignment");
        then.status(401);
    });

    let store = store_for(&server)?;
    let result = store.list(&Credential::bearer("stale")).await;

    assert!(matches!(result, Err(DeskError::SessionExpired)));
    Ok(())
}

#[tokio::test]
async fn test_create_posts_not_started_consignment() -> Result<()> {
    let server = MockServer::start();

    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/consignment")
            .json_body(json!({"date": "2024-05-20", "status": "Not started"}));
        then.status(201)
            .json_body(json!({"id": 42, "date": "2024-05-20", "status": "Not started"}));
    });

    let store = store_for(&server)?;
    let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 20).ok_or_else(|| anyhow::anyhow!("date"))?;
    let created = store.create(date, &Credential::bearer("t")).await?;

    create.assert();
    assert_eq!(created.id, Some(42));
    assert_eq!(created.status, ConsignmentStatus::NotStarted);
    Ok(())
}

#[tokio::test]
async fn test_reference_only_sections_survive_the_merge() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/consignment/9");
        then.status(200).json_body(json!({
            "id": 9,
            "status": "Pending",
            "goods": [{"id": 5, "item": {"id": 3}}]
        }));
    });
    let write = server.mock(|when, then| {
        when.method(PUT).path("/consignment/9").json_body(json!({
            "id": 9,
            "status": "Pending",
            "goods": [{"id": 5, "item": {"id": 3}}],
            "packing": {"id": 2}
        }));
        then.status(200).json_body(json!({
            "id": 9,
            "status": "Pending",
            "goods": [{"id": 5, "item": {"id": 3}}],
            "packing": {"id": 2}
        }));
    });

    let store = store_for(&server)?;
    let updated = store
        .update_consignment(
            9,
            patch(json!({"packing": {"id": 2}})),
            None,
            &Credential::bearer("t"),
        )
        .await?;

    write.assert();
    assert_eq!(updated["packing"], json!({"id": 2}));
    assert_eq!(updated["goods"][0]["item"], json!({"id": 3}));
    Ok(())
}
