use std::sync::Arc;

use error_stack::Report;
use filigree::testing::TestClient;
use futures::future::FutureExt;
use serde_json::json;
use tracing::{event, Level};

use crate::{
    database::testing::{test_db, TestDb},
    models::{
        permission::PermissionId,
        role::{RoleId, RolePermissionsPayload},
    },
    remote::testing::{FakeAuthBridge, FakePropertyStore},
    Error,
};

pub struct TestApp {
    /// Hold on to the shutdown signal so the server stays alive
    pub shutdown_tx: tokio::sync::oneshot::Sender<()>,
    pub client: TestClient,
    pub base_url: String,
    pub db: TestDb,
    pub bridge: Arc<FakeAuthBridge>,
    pub storage: Arc<FakePropertyStore>,
    pub server_task: tokio::task::JoinHandle<Result<(), Report<Error>>>,
}

pub async fn start_app() -> TestApp {
    error_stack::Report::set_color_mode(error_stack::fmt::ColorMode::None);
    filigree::tracing_config::test::init();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    // Make the shutdown future resolve to () so the type matches what Axum expects.
    let shutdown_rx = shutdown_rx.map(|_| ());

    let db = test_db().await;
    let bridge = Arc::new(FakeAuthBridge::default());
    let storage = Arc::new(FakePropertyStore::default());

    let listener = crate::server::create_tcp_listener("127.0.0.1", 0)
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{port}");

    let config = crate::server::Config {
        env: "test".into(),
        bind: crate::server::ServerBind::Listener(listener),
        request_timeout: std::time::Duration::from_secs(30),
        db: db.pool.clone(),
        bridge: bridge.clone(),
        storage: storage.clone(),
    };

    let server = crate::server::create_server(config)
        .await
        .expect("creating server");

    let client = TestClient::new(base_url.clone());

    let server_task = tokio::task::spawn(server.run_with_shutdown_signal(shutdown_rx));

    event!(Level::INFO, "finished starting test app");

    TestApp {
        shutdown_tx,
        client,
        base_url,
        db,
        bridge,
        storage,
        server_task,
    }
}

/// A role with `count` permissions, of which the ones at the `granted` indexes belong to the
/// role.
pub struct SeededRole {
    pub role_id: RoleId,
    pub permission_ids: Vec<PermissionId>,
}

pub async fn seed_role(client: &TestClient, count: usize, granted: &[usize]) -> SeededRole {
    let role_id: RoleId = client
        .post("role/create")
        .json(&json!({ "name": "editor", "description": "Edits things" }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();

    let payloads = (0..count)
        .map(crate::models::permission::testing::make_create_payload)
        .collect::<Vec<_>>();
    let permission_ids: Vec<PermissionId> = client
        .post("permission/create")
        .json(&payloads)
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();

    client
        .post("role/grant")
        .json(&RolePermissionsPayload {
            role_id,
            permission_ids: granted.iter().map(|&i| permission_ids[i]).collect(),
        })
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    SeededRole {
        role_id,
        permission_ids,
    }
}
