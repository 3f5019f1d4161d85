use serde_json::{json, Value};

use super::{testing::make_create_payload, PermissionId};
use crate::tests::{seed_role, start_app};

async fn search(client: &filigree::testing::TestClient, query: &str) -> Vec<Value> {
    client
        .get(&format!("permission/search?{query}"))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn batch_create_returns_ids_in_order() {
    let app = start_app().await;

    let ids: Vec<PermissionId> = app
        .client
        .post("permission/create")
        .json(&json!([
            { "name": "c:read" },
            { "name": "a:read", "description": "Read a" },
            { "name": "b:read" },
        ]))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let all = search(&app.client, "").await;
    for (id, name) in ids.iter().zip(["c:read", "a:read", "b:read"]) {
        let found = all.iter().find(|p| p["id"] == json!(id)).unwrap();
        assert_eq!(found["name"], json!(name));
    }
}

#[tokio::test]
async fn duplicate_in_batch_aborts_batch() {
    let app = start_app().await;

    let response = app
        .client
        .post("permission/create")
        .json(&json!([{ "name": "x" }, { "name": "y" }, { "name": "x" }]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert!(search(&app.client, "").await.is_empty());
}

#[tokio::test]
async fn search_by_role() {
    let app = start_app().await;
    let seeded = seed_role(&app.client, 6, &[4, 0, 2]).await;

    let found = search(&app.client, &format!("role_id={}", seeded.role_id)).await;
    let found_ids = found.iter().map(|p| p["id"].clone()).collect::<Vec<_>>();
    let expected = [0, 2, 4]
        .iter()
        .map(|&i| json!(seeded.permission_ids[i]))
        .collect::<Vec<_>>();
    assert_eq!(found_ids, expected);
}

#[tokio::test]
async fn search_pages() {
    let app = start_app().await;
    let payloads = (0..25).map(make_create_payload).collect::<Vec<_>>();
    let ids: Vec<PermissionId> = app
        .client
        .post("permission/create")
        .json(&payloads)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let page = search(&app.client, "page=2&size=10").await;
    let page_ids = page.iter().map(|p| p["id"].clone()).collect::<Vec<_>>();
    let expected = ids[10..20].iter().map(|id| json!(id)).collect::<Vec<_>>();
    assert_eq!(page_ids, expected);

    let named = search(&app.client, "name=permission%3A1").await;
    // permission:1 and permission:10 through permission:19
    assert_eq!(named.len(), 11);
}

#[tokio::test]
async fn zero_page_is_rejected() {
    let app = start_app().await;

    let response = app
        .client
        .get("permission/search?page=0")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
}
