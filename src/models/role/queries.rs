use error_stack::{Report, ResultExt};
use sqlx::{SqliteConnection, SqliteExecutor};
use tracing::instrument;

use super::{types::*, RoleId};
use crate::{
    database::classify_db_error,
    models::{permission::PermissionId, Timestamps},
    Error,
};

/// Get a Role from the database
#[instrument(skip(db))]
pub async fn get(db: impl SqliteExecutor<'_>, id: RoleId) -> Result<Role, Report<Error>> {
    find(db, id).await?.ok_or(Error::NotFound("Role").into())
}

/// Get a Role from the database, returning `None` if it does not exist.
#[instrument(skip(db))]
pub async fn find(db: impl SqliteExecutor<'_>, id: RoleId) -> Result<Option<Role>, Report<Error>> {
    sqlx::query_as::<_, Role>(
        "SELECT id, name, description, create_time, update_time
        FROM role WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

#[instrument(skip(db))]
pub async fn exists(db: impl SqliteExecutor<'_>, id: RoleId) -> Result<bool, Report<Error>> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM role WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
        .change_context(Error::Db)?;

    Ok(found.is_some())
}

/// Create a new Role in the database.
#[instrument(skip(db))]
pub async fn create(
    db: impl SqliteExecutor<'_>,
    payload: RoleCreatePayload,
) -> Result<RoleId, Report<Error>> {
    if payload.name.trim().is_empty() {
        return Err(Error::validation("Role name must not be empty"));
    }

    let ts = Timestamps::now();
    let result = sqlx::query(
        "INSERT INTO role (name, description, create_time, update_time)
        VALUES (?, ?, ?, ?)",
    )
    .bind(&payload.name)
    .bind(payload.description.unwrap_or_default())
    .bind(ts.create_time)
    .bind(ts.update_time)
    .execute(db)
    .await
    .map_err(|e| classify_db_error(e, "Role"))?;

    Ok(RoleId(result.last_insert_rowid()))
}

/// Attach permissions to a role. The role and every permission must exist, and none of the
/// pairs may already be present.
#[instrument(skip(tx))]
pub async fn grant_permissions(
    tx: &mut SqliteConnection,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> Result<(), Report<Error>> {
    if !exists(&mut *tx, role_id).await? {
        return Err(Report::new(Error::NotFound("Role")));
    }

    let ts = Timestamps::now();
    for &permission_id in permission_ids {
        if !crate::models::permission::queries::exists(&mut *tx, permission_id).await? {
            return Err(Report::new(Error::NotFound("Permission")))
                .attach_printable_lazy(|| format!("Permission id {permission_id}"));
        }

        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id, create_time, update_time)
            VALUES (?, ?, ?, ?)",
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(ts.create_time)
        .bind(ts.update_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "Role permission"))
        .attach_printable_lazy(|| format!("Role {role_id}, permission {permission_id}"))?;
    }

    Ok(())
}

/// Detach permissions from a role, returning how many pairs were removed.
#[instrument(skip(tx))]
pub async fn revoke_permissions(
    tx: &mut SqliteConnection,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> Result<u64, Report<Error>> {
    if !exists(&mut *tx, role_id).await? {
        return Err(Report::new(Error::NotFound("Role")));
    }

    let mut removed = 0;
    for &permission_id in permission_ids {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
                .bind(role_id)
                .bind(permission_id)
                .execute(&mut *tx)
                .await
                .change_context(Error::Db)?;
        removed += result.rows_affected();
    }

    Ok(removed)
}
