use axum::{extract::State, response::IntoResponse, routing, Json};
use axum_extra::extract::Query;

use super::{queries, types::*};
use crate::{rbac, server::ServerState, Error};

async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<Vec<PermissionCreatePayload>>,
) -> Result<impl IntoResponse, Error> {
    let ids = rbac::create_permissions(&state.db, &payload).await?;

    Ok(Json(ids))
}

async fn search(
    State(state): State<ServerState>,
    Query(qs): Query<PermissionSearch>,
) -> Result<impl IntoResponse, Error> {
    let results = queries::search(&state.db, &qs).await?;

    Ok(Json(results))
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/permission/create", routing::post(create))
        .route("/permission/search", routing::get(search))
}
