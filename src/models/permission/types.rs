use serde::{Deserialize, Serialize};

use super::PermissionId;
use crate::models::{role::RoleId, Timestamps};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[cfg_attr(test, derive(Serialize))]
pub struct PermissionCreatePayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Filters for searching permissions. Without `page` the full filtered set is returned.
#[derive(Deserialize, Debug, Clone, Default)]
#[cfg_attr(test, derive(Serialize))]
pub struct PermissionSearch {
    /// Case-sensitive substring of the permission name
    pub name: Option<String>,
    /// Only permissions granted to this role
    pub role_id: Option<RoleId>,
    /// 1-indexed page number
    pub page: Option<u32>,
    /// Page size, defaulting to [DEFAULT_PAGE_SIZE]
    pub size: Option<u32>,
}

impl PermissionSearch {
    pub fn for_role(role_id: RoleId) -> Self {
        Self {
            role_id: Some(role_id),
            ..Default::default()
        }
    }

    /// The `LIMIT` and `OFFSET` to apply, if paginating.
    pub fn limit_offset(&self) -> Option<(i64, i64)> {
        let page = i64::from(self.page?);
        let size = i64::from(self.size.unwrap_or(DEFAULT_PAGE_SIZE));
        // Both factors fit in u32, so the product can't overflow i64.
        Some((size, (page - 1).max(0) * size))
    }
}
