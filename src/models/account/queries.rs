use error_stack::{Report, ResultExt};
use sqlx::SqliteExecutor;
use tracing::instrument;

use super::{types::*, AccountId};
use crate::{
    database::classify_db_error,
    models::{role::RoleId, Timestamps},
    Error,
};

/// Insert an account row. Validation and the role existence check happen before this.
#[instrument(skip(db))]
pub async fn create_raw(
    db: impl SqliteExecutor<'_>,
    id: &AccountId,
    name: &str,
    role_id: Option<RoleId>,
) -> Result<(), Report<Error>> {
    let ts = Timestamps::now();
    sqlx::query(
        "INSERT INTO account (id, name, role_id, create_time, update_time)
        VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(role_id)
    .bind(ts.create_time)
    .bind(ts.update_time)
    .execute(db)
    .await
    .map_err(|e| classify_db_error(e, "Account"))?;

    Ok(())
}

#[instrument(skip(db))]
pub async fn get(db: impl SqliteExecutor<'_>, id: &AccountId) -> Result<Account, Report<Error>> {
    find(db, id).await?.ok_or(Error::NotFound("Account").into())
}

#[instrument(skip(db))]
pub async fn find(
    db: impl SqliteExecutor<'_>,
    id: &AccountId,
) -> Result<Option<Account>, Report<Error>> {
    sqlx::query_as::<_, Account>(
        "SELECT id, name, role_id, create_time, update_time
        FROM account WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

#[instrument(skip(db))]
pub async fn find_by_name(
    db: impl SqliteExecutor<'_>,
    name: &str,
) -> Result<Option<Account>, Report<Error>> {
    sqlx::query_as::<_, Account>(
        "SELECT id, name, role_id, create_time, update_time
        FROM account WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

/// Delete an account row, returning whether it existed.
#[instrument(skip(db))]
pub async fn delete(db: impl SqliteExecutor<'_>, id: &AccountId) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM account WHERE id = ?")
        .bind(id)
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

/// Change the role of an account, returning whether the account exists.
#[instrument(skip(db))]
pub async fn update_role(
    db: impl SqliteExecutor<'_>,
    id: &AccountId,
    role_id: Option<RoleId>,
) -> Result<bool, Report<Error>> {
    let result = sqlx::query("UPDATE account SET role_id = ?, update_time = ? WHERE id = ?")
        .bind(role_id)
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database::testing::test_db, models::role};

    #[tokio::test]
    async fn create_and_find() {
        let db = test_db().await;
        let id = AccountId::new();
        create_raw(&db.pool, &id, "alice", None).await.unwrap();

        let account = get(&db.pool, &id).await.unwrap();
        assert_eq!(account.name, "alice");
        assert_eq!(account.role_id, None);

        let by_name = find_by_name(&db.pool, "alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert!(find_by_name(&db.pool, "Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let db = test_db().await;
        create_raw(&db.pool, &AccountId::new(), "alice", None)
            .await
            .unwrap();
        let err = create_raw(&db.pool, &AccountId::new(), "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), Error::Conflict("Account")));
    }

    #[tokio::test]
    async fn unknown_role_is_rejected_by_foreign_key() {
        let db = test_db().await;
        let err = create_raw(&db.pool, &AccountId::new(), "alice", Some(RoleId(5)))
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), Error::Db));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let db = test_db().await;
        let id = AccountId::new();
        create_raw(&db.pool, &id, "alice", None).await.unwrap();

        assert!(delete(&db.pool, &id).await.unwrap());
        assert!(!delete(&db.pool, &id).await.unwrap());
        assert!(find(&db.pool, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_role_refreshes_update_time() {
        let db = test_db().await;
        let role_id = role::queries::create(&db.pool, role::testing::make_create_payload(0))
            .await
            .unwrap();
        let id = AccountId::new();
        create_raw(&db.pool, &id, "alice", None).await.unwrap();
        let before = get(&db.pool, &id).await.unwrap();

        assert!(update_role(&db.pool, &id, Some(role_id)).await.unwrap());
        let after = get(&db.pool, &id).await.unwrap();
        assert_eq!(after.role_id, Some(role_id));
        assert_eq!(after.timestamps.create_time, before.timestamps.create_time);
        assert!(after.timestamps.update_time >= before.timestamps.update_time);

        assert!(!update_role(&db.pool, &AccountId::new(), None).await.unwrap());
    }
}
