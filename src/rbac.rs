//! Role-based access queries that combine several tables, and the transactional wrappers around
//! multi-row permission writes.

use error_stack::{Report, ResultExt};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::{
    database::begin_write,
    models::{
        account::{self, AccountDetail, AccountId, AccountRolePayload},
        permission::{self, PermissionCreatePayload, PermissionId, PermissionSearch},
        role::{self, RoleDetail, RoleId, RolePermissionsPayload},
    },
    remote::{
        storage::{record_to_properties, ACCOUNT_PROPERTIES},
        PropertyStore,
    },
    Error,
};

/// Load an account with its role, the permissions granted through that role, and the
/// properties stored for it.
#[instrument(skip(db, storage))]
pub async fn account_detail(
    db: &SqlitePool,
    storage: &dyn PropertyStore,
    id: &AccountId,
) -> Result<AccountDetail, Report<Error>> {
    let account = account::queries::get(db, id).await?;

    let (role, permissions) = match account.role_id {
        Some(role_id) => {
            let role = role::queries::find(db, role_id)
                .await?
                .ok_or(Error::Integrity("Role"))
                .attach_printable_lazy(|| format!("Account {id} references role {role_id}"))?;
            let permissions =
                permission::queries::search(db, &PermissionSearch::for_role(role_id)).await?;
            (Some(role), permissions)
        }
        None => (None, Vec::new()),
    };

    let record = storage
        .get(ACCOUNT_PROPERTIES, id.as_str())
        .await
        .change_context(Error::Upstream("storage"))?;

    Ok(AccountDetail {
        account,
        role,
        permissions,
        properties: record_to_properties(record),
    })
}

#[instrument(skip(db))]
pub async fn role_detail(db: &SqlitePool, id: RoleId) -> Result<RoleDetail, Report<Error>> {
    let role = role::queries::get(db, id).await?;
    let permissions = permission::queries::search(db, &PermissionSearch::for_role(id)).await?;

    Ok(RoleDetail { role, permissions })
}

/// Create a batch of permissions atomically.
pub async fn create_permissions(
    db: &SqlitePool,
    payloads: &[PermissionCreatePayload],
) -> Result<Vec<PermissionId>, Report<Error>> {
    let mut tx = begin_write(db).await?;
    let ids = permission::queries::create_batch(&mut tx, payloads).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok(ids)
}

pub async fn grant(db: &SqlitePool, payload: &RolePermissionsPayload) -> Result<(), Report<Error>> {
    let mut tx = begin_write(db).await?;
    role::queries::grant_permissions(&mut tx, payload.role_id, &payload.permission_ids).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok(())
}

pub async fn revoke(
    db: &SqlitePool,
    payload: &RolePermissionsPayload,
) -> Result<u64, Report<Error>> {
    let mut tx = begin_write(db).await?;
    let removed =
        role::queries::revoke_permissions(&mut tx, payload.role_id, &payload.permission_ids)
            .await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok(removed)
}

/// Move an account into a role, or out of any role.
pub async fn assign_role(
    db: &SqlitePool,
    payload: &AccountRolePayload,
) -> Result<(), Report<Error>> {
    let mut tx = begin_write(db).await?;

    if let Some(role_id) = payload.role_id {
        if !role::queries::exists(&mut *tx, role_id).await? {
            return Err(Report::new(Error::NotFound("Role")));
        }
    }

    if !account::queries::update_role(&mut *tx, &payload.id, payload.role_id).await? {
        return Err(Report::new(Error::NotFound("Account")));
    }

    tx.commit().await.change_context(Error::Db)?;
    Ok(())
}
