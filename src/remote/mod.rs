//! Clients for the services this server delegates to: the auth bridge, which owns credentials
//! and token issuance, and the property store, which owns free-form account attributes.

use error_stack::{Report, ResultExt};
use thiserror::Error;

pub mod bridge;
pub mod storage;
#[cfg(test)]
pub mod testing;

pub use bridge::{AuthBridge, HttpAuthBridge};
pub use storage::{HttpPropertyStore, PropertyOp, PropertyStore, PropertyTransaction};

/// A failed call to a remote collaborator.
#[derive(Debug, Error)]
#[error("{service}: {kind}")]
pub struct RemoteError {
    /// Which collaborator was called
    pub service: &'static str,
    pub kind: RemoteErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteErrorKind {
    #[error("failed to send request")]
    Sending,
    #[error("returned status {0}")]
    Status(u16),
    #[error("failed to read response")]
    ParsingResponse,
    #[error("rejected the request")]
    Rejected,
}

impl RemoteError {
    pub fn new(service: &'static str, kind: RemoteErrorKind) -> Self {
        Self { service, kind }
    }
}

/// Send a request and turn transport failures and non-success statuses into errors. The
/// response body of a failed request is attached to the report.
pub(crate) async fn send_checked(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, Report<RemoteError>> {
    let response = request
        .send()
        .await
        .change_context(RemoteError::new(service, RemoteErrorKind::Sending))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Report::new(RemoteError::new(
        service,
        RemoteErrorKind::Status(status.as_u16()),
    ))
    .attach_printable(format!("Response body: {body}")))
}
