use error_stack::{Report, ResultExt};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, PermissionId};
use crate::{database::classify_db_error, models::Timestamps, Error};

#[instrument(skip(db))]
pub async fn exists(db: impl SqliteExecutor<'_>, id: PermissionId) -> Result<bool, Report<Error>> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM permission WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
        .change_context(Error::Db)?;

    Ok(found.is_some())
}

/// Insert a batch of permissions, returning their ids in input order. Run this inside a
/// transaction so that a failure part of the way through leaves no rows behind.
#[instrument(skip(tx))]
pub async fn create_batch(
    tx: &mut SqliteConnection,
    payloads: &[PermissionCreatePayload],
) -> Result<Vec<PermissionId>, Report<Error>> {
    if payloads.iter().any(|p| p.name.trim().is_empty()) {
        return Err(Error::validation("Permission name must not be empty"));
    }

    let ts = Timestamps::now();
    let mut ids = Vec::with_capacity(payloads.len());

    for payload in payloads {
        let result = sqlx::query(
            "INSERT INTO permission (name, description, create_time, update_time)
            VALUES (?, ?, ?, ?)",
        )
        .bind(&payload.name)
        .bind(payload.description.as_deref().unwrap_or_default())
        .bind(ts.create_time)
        .bind(ts.update_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "Permission"))
        .attach_printable_lazy(|| format!("Permission name {}", payload.name))?;

        ids.push(PermissionId(result.last_insert_rowid()));
    }

    Ok(ids)
}

/// Search permissions by name substring and owning role, optionally paginated. Results are
/// ordered by id.
#[instrument(skip(db))]
pub async fn search(
    db: impl SqliteExecutor<'_>,
    filters: &PermissionSearch,
) -> Result<Vec<Permission>, Report<Error>> {
    if filters.page == Some(0) || filters.size == Some(0) {
        return Err(Error::validation("page and size must be at least 1"));
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT p.id, p.name, p.description, p.create_time, p.update_time
        FROM permission p",
    );

    if let Some(role_id) = filters.role_id {
        query
            .push(" JOIN role_permissions rp ON rp.permission_id = p.id AND rp.role_id = ")
            .push_bind(role_id);
    }

    if let Some(name) = &filters.name {
        // instr is case-sensitive, unlike LIKE
        query
            .push(" WHERE instr(p.name, ")
            .push_bind(name.clone())
            .push(") > 0");
    }

    query.push(" ORDER BY p.id");

    if let Some((limit, offset)) = filters.limit_offset() {
        event!(Level::DEBUG, limit, offset);
        query
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
    }

    query
        .build_query_as::<Permission>()
        .fetch_all(db)
        .await
        .change_context(Error::Db)
}
