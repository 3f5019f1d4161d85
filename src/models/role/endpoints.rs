use axum::{extract::State, response::IntoResponse, routing, Json};
use axum_extra::extract::Query;
use serde::Deserialize;

use super::{queries, types::*, RoleId};
use crate::{rbac, server::ServerState, Error};

#[derive(Deserialize, Debug)]
struct RoleIdQuery {
    id: RoleId,
}

async fn get(
    State(state): State<ServerState>,
    Query(qs): Query<RoleIdQuery>,
) -> Result<impl IntoResponse, Error> {
    let object = queries::get(&state.db, qs.id).await?;

    Ok(Json(object))
}

async fn detail(
    State(state): State<ServerState>,
    Query(qs): Query<RoleIdQuery>,
) -> Result<impl IntoResponse, Error> {
    let object = rbac::role_detail(&state.db, qs.id).await?;

    Ok(Json(object))
}

async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<RoleCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let id = queries::create(&state.db, payload).await?;

    Ok(Json(id))
}

async fn grant(
    State(state): State<ServerState>,
    Json(payload): Json<RolePermissionsPayload>,
) -> Result<impl IntoResponse, Error> {
    rbac::grant(&state.db, &payload).await?;

    Ok("ok")
}

async fn revoke(
    State(state): State<ServerState>,
    Json(payload): Json<RolePermissionsPayload>,
) -> Result<impl IntoResponse, Error> {
    let removed = rbac::revoke(&state.db, &payload).await?;

    Ok(Json(removed))
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/role/get", routing::get(get))
        .route("/role/detail", routing::get(detail))
        .route("/role/create", routing::post(create))
        .route("/role/grant", routing::post(grant))
        .route("/role/revoke", routing::post(revoke))
}
