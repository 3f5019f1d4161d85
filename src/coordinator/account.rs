use std::sync::Arc;

use error_stack::{Report, ResultExt};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{event, instrument, Level};

use super::{run_detached, Compensations};
use crate::{
    database::begin_write,
    models::{
        account::{self, AccountCreatePayload, AccountId, AccountVerifyPayload},
        role,
    },
    remote::{
        storage::{ACCOUNT_PROPERTIES, RESERVED_ID_FIELD},
        AuthBridge, PropertyStore, PropertyTransaction,
    },
    Error,
};

/// Account lifecycle across the database, the auth bridge, and the property store.
#[derive(Debug, Clone)]
pub struct AccountCoordinator {
    db: SqlitePool,
    bridge: Arc<dyn AuthBridge>,
    storage: Arc<dyn PropertyStore>,
}

impl AccountCoordinator {
    pub fn new(
        db: SqlitePool,
        bridge: Arc<dyn AuthBridge>,
        storage: Arc<dyn PropertyStore>,
    ) -> Self {
        Self {
            db,
            bridge,
            storage,
        }
    }

    /// Create an account along with its credentials and property record. Either all three
    /// exist afterwards or, as far as the collaborators allow, none of them do.
    pub async fn create(&self, payload: AccountCreatePayload) -> Result<AccountId, Report<Error>> {
        payload.validate()?;

        let this = self.clone();
        run_detached(async move { this.create_steps(payload).await }).await
    }

    #[instrument(skip(self))]
    async fn create_steps(
        &self,
        payload: AccountCreatePayload,
    ) -> Result<AccountId, Report<Error>> {
        let mut tx = begin_write(&self.db).await?;

        if let Some(role_id) = payload.role_id {
            if !role::queries::exists(&mut *tx, role_id).await? {
                return Err(Report::new(Error::NotFound("Role")))
                    .attach_printable_lazy(|| format!("Role id {role_id}"));
            }
        }

        let id = AccountId::new();
        account::queries::create_raw(&mut *tx, &id, &payload.name, payload.role_id).await?;

        let mut compensations = Compensations::default();
        if let Err(e) = self.create_remote(&id, payload, &mut compensations).await {
            if let Err(rollback_err) = tx.rollback().await {
                event!(Level::ERROR, error = ?rollback_err, "Failed to roll back account insert");
            }
            compensations.run().await;
            return Err(e);
        }

        if let Err(e) = tx.commit().await.change_context(Error::Db) {
            compensations.run().await;
            return Err(e);
        }

        event!(Level::INFO, account_id = %id, "Created account");
        Ok(id)
    }

    async fn create_remote(
        &self,
        id: &AccountId,
        payload: AccountCreatePayload,
        compensations: &mut Compensations,
    ) -> Result<(), Report<Error>> {
        self.bridge
            .save_credentials(id, &payload.password)
            .await
            .change_context(Error::Upstream("bridge"))?;

        let bridge = self.bridge.clone();
        let saved_id = id.clone();
        compensations.push("delete credentials", async move {
            bridge.delete_credentials(&saved_id).await
        });

        let mut record = payload.properties.unwrap_or_default();
        record.insert(RESERVED_ID_FIELD.to_string(), Value::String(id.to_string()));

        // Registered before the save, since the store may have applied a save whose response
        // never arrived. Deleting a missing record succeeds.
        let storage = self.storage.clone();
        let saved_id = id.to_string();
        compensations.push("delete properties", async move {
            let mut properties = PropertyTransaction::new(storage.as_ref());
            properties.delete(ACCOUNT_PROPERTIES, &saved_id);
            properties.commit().await
        });

        let mut properties = PropertyTransaction::new(self.storage.as_ref());
        properties.save(ACCOUNT_PROPERTIES, vec![record]);
        properties
            .commit()
            .await
            .change_context(Error::Upstream("storage"))
    }

    /// Delete an account and its remote records. Deleting an account that does not exist
    /// succeeds without contacting the collaborators.
    pub async fn delete(&self, id: AccountId) -> Result<(), Report<Error>> {
        let this = self.clone();
        run_detached(async move { this.delete_steps(id).await }).await
    }

    #[instrument(skip(self))]
    async fn delete_steps(&self, id: AccountId) -> Result<(), Report<Error>> {
        let mut tx = begin_write(&self.db).await?;

        let existed = account::queries::delete(&mut *tx, &id).await?;
        if !existed {
            tx.commit().await.change_context(Error::Db)?;
            event!(Level::DEBUG, account_id = %id, "Account already absent");
            return Ok(());
        }

        // Remote deletes are idempotent, so leaving the row in place on failure lets the
        // caller retry the whole operation.
        if let Err(e) = self.delete_remote(&id).await {
            if let Err(rollback_err) = tx.rollback().await {
                event!(Level::ERROR, error = ?rollback_err, "Failed to roll back account delete");
            }
            return Err(e);
        }

        tx.commit().await.change_context(Error::Db)?;
        event!(Level::INFO, account_id = %id, "Deleted account");
        Ok(())
    }

    async fn delete_remote(&self, id: &AccountId) -> Result<(), Report<Error>> {
        self.bridge
            .delete_credentials(id)
            .await
            .change_context(Error::Upstream("bridge"))?;

        let mut properties = PropertyTransaction::new(self.storage.as_ref());
        properties.delete(ACCOUNT_PROPERTIES, id.as_str());
        properties
            .commit()
            .await
            .change_context(Error::Upstream("storage"))
    }

    /// Check a name and password, returning a token for the account on success.
    #[instrument(skip(self))]
    pub async fn verify(&self, payload: AccountVerifyPayload) -> Result<String, Report<Error>> {
        let account = account::queries::find_by_name(&self.db, &payload.name)
            .await?
            .ok_or_else(|| Report::new(Error::Login))
            .attach_printable("Unknown account name")?;

        self.bridge
            .verify_credentials(&account.id, &payload.password)
            .await
            .change_context(Error::Login)?;

        self.bridge
            .encode_token(&account.id)
            .await
            .change_context(Error::Login)
    }
}
