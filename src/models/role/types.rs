use serde::{Deserialize, Serialize};

use super::RoleId;
use crate::models::{
    permission::{Permission, PermissionId},
    Timestamps,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[cfg_attr(test, derive(Serialize))]
pub struct RoleCreatePayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A role along with every permission granted to it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoleDetail {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

/// Permissions to grant to or revoke from a role.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(Serialize))]
pub struct RolePermissionsPayload {
    pub role_id: RoleId,
    pub permission_ids: Vec<PermissionId>,
}
