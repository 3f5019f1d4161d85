use error_stack::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AccountId;
use crate::{
    models::{permission::Permission, role::Role, role::RoleId, Timestamps},
    remote::storage::RESERVED_ID_FIELD,
    Error,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub role_id: Option<RoleId>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Deserialize, Clone, Default)]
#[cfg_attr(test, derive(Serialize))]
pub struct AccountCreatePayload {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub role_id: Option<RoleId>,
    /// Extra attributes kept in the property store
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl std::fmt::Debug for AccountCreatePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCreatePayload")
            .field("name", &self.name)
            .field("password", &"[redacted]")
            .field("role_id", &self.role_id)
            .field("properties", &self.properties)
            .finish()
    }
}

impl AccountCreatePayload {
    pub fn validate(&self) -> Result<(), Report<Error>> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Account name must not be empty"));
        }

        if self.password.is_empty() {
            return Err(Error::validation("Password must not be empty"));
        }

        if self
            .properties
            .as_ref()
            .is_some_and(|p| p.contains_key(RESERVED_ID_FIELD))
        {
            return Err(Error::validation(format!(
                "properties may not contain the reserved key `{RESERVED_ID_FIELD}`"
            )));
        }

        Ok(())
    }
}

#[derive(Deserialize, Clone)]
#[cfg_attr(test, derive(Serialize))]
pub struct AccountVerifyPayload {
    pub name: String,
    pub password: String,
}

impl std::fmt::Debug for AccountVerifyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountVerifyPayload")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Move an account to another role, or out of any role when `role_id` is null.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(Serialize))]
pub struct AccountRolePayload {
    pub id: AccountId,
    pub role_id: Option<RoleId>,
}

/// An account with its role, the role's permissions, and its stored properties.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountDetail {
    #[serde(flatten)]
    pub account: Account,
    pub role: Option<Role>,
    pub permissions: Vec<Permission>,
    pub properties: Map<String, Value>,
}
