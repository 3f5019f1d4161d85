use super::RoleCreatePayload;

/// Generate a RoleCreatePayload for testing.
/// Parameter `i` controls the value of some of the fields, just to make sure that the objects
/// don't all look identical.
pub fn make_create_payload(i: usize) -> RoleCreatePayload {
    RoleCreatePayload {
        name: format!("Test role {i}"),
        description: (i > 1).then(|| format!("Test role {i}")),
    }
}
