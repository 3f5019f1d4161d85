pub mod endpoints;
pub mod queries;
#[cfg(test)]
mod tests;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use types::*;

/// Integer surrogate key of a permission.
#[derive(
    sqlx::Type,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PermissionId(pub i64);

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
