use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    routing, Json,
};
use axum_extra::extract::Query;
use error_stack::{Report, ResultExt};
use serde::Deserialize;

use super::{types::*, AccountId};
use crate::{rbac, server::ServerState, Error};

#[derive(Deserialize, Debug)]
struct AccountIdQuery {
    id: AccountId,
}

async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<AccountCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let id = state.accounts.create(payload).await?;

    Ok(id.into_inner())
}

async fn delete(
    State(state): State<ServerState>,
    Query(qs): Query<AccountIdQuery>,
) -> Result<impl IntoResponse, Error> {
    state.accounts.delete(qs.id).await?;

    Ok("ok")
}

async fn verify(
    State(state): State<ServerState>,
    Json(payload): Json<AccountVerifyPayload>,
) -> Result<impl IntoResponse, Error> {
    let token = state.accounts.verify(payload).await?;
    let token = HeaderValue::from_str(&token)
        .map_err(|e| Report::new(e).change_context(Error::Login))
        .attach_printable("Token is not a valid header value")?;

    Ok(([(header::AUTHORIZATION, token)], "ok"))
}

async fn detail(
    State(state): State<ServerState>,
    Query(qs): Query<AccountIdQuery>,
) -> Result<impl IntoResponse, Error> {
    let object = rbac::account_detail(&state.db, state.storage.as_ref(), &qs.id).await?;

    Ok(Json(object))
}

async fn set_role(
    State(state): State<ServerState>,
    Json(payload): Json<AccountRolePayload>,
) -> Result<impl IntoResponse, Error> {
    rbac::assign_role(&state.db, &payload).await?;

    Ok("ok")
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/account/create", routing::post(create))
        .route("/account/delete", routing::post(delete))
        .route("/account/verify", routing::post(verify))
        .route("/account/detail", routing::get(detail))
        .route("/account/role", routing::post(set_role))
}
