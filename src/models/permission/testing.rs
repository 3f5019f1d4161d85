use super::PermissionCreatePayload;

/// Generate a PermissionCreatePayload for testing.
/// Parameter `i` controls the value of some of the fields, just to make sure that the objects
/// don't all look identical.
pub fn make_create_payload(i: usize) -> PermissionCreatePayload {
    PermissionCreatePayload {
        name: format!("permission:{i}"),
        description: (i % 2 == 0).then(|| format!("Test permission {i}")),
    }
}
