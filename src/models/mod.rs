pub mod account;
pub mod permission;
pub mod role;

use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::server::ServerState;

/// Creation and last-update times carried by every stored entity. The query layer sets both
/// on insert and refreshes `update_time` on every update.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct Timestamps {
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Timestamps {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            create_time: now,
            update_time: now,
        }
    }
}

pub fn create_routes() -> Router<ServerState> {
    Router::new()
        .merge(account::endpoints::create_routes())
        .merge(permission::endpoints::create_routes())
        .merge(role::endpoints::create_routes())
}
