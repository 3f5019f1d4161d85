use serde_json::json;

use super::AccountCreatePayload;

/// Generate an AccountCreatePayload for testing.
/// Parameter `i` controls the value of some of the fields, just to make sure that the objects
/// don't all look identical.
pub fn make_create_payload(i: usize) -> AccountCreatePayload {
    AccountCreatePayload {
        name: format!("account-{i}"),
        password: format!("password-{i}"),
        role_id: None,
        properties: (i % 2 == 1)
            .then(|| json!({ "email": format!("account-{i}@example.com") }))
            .and_then(|v| v.as_object().cloned()),
    }
}
