//! The auth bridge stores and checks passwords and issues signed tokens. This server never
//! sees a password after handing it off.

use std::fmt::Debug;

use error_stack::{Report, ResultExt};
use serde::Serialize;
use tracing::instrument;

use super::{send_checked, RemoteError, RemoteErrorKind};
use crate::models::account::AccountId;

const SERVICE: &str = "bridge";

#[async_trait::async_trait]
pub trait AuthBridge: Debug + Send + Sync {
    /// Store the password for a newly created account.
    async fn save_credentials(
        &self,
        id: &AccountId,
        password: &str,
    ) -> Result<(), Report<RemoteError>>;

    /// Remove the stored password for an account. Removing absent credentials is not an error.
    async fn delete_credentials(&self, id: &AccountId) -> Result<(), Report<RemoteError>>;

    /// Check a password. Any error, including a rejected password, means the check failed.
    async fn verify_credentials(
        &self,
        id: &AccountId,
        password: &str,
    ) -> Result<(), Report<RemoteError>>;

    /// Issue a signed token for the account.
    async fn encode_token(&self, id: &AccountId) -> Result<String, Report<RemoteError>>;
}

/// The HTTP implementation of the auth bridge.
#[derive(Debug, Clone)]
pub struct HttpAuthBridge {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    id: &'a AccountId,
    password: &'a str,
}

#[derive(Serialize)]
struct EncodeTokenBody<'a> {
    account_id: &'a AccountId,
}

impl HttpAuthBridge {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl AuthBridge for HttpAuthBridge {
    #[instrument(skip(self, password))]
    async fn save_credentials(
        &self,
        id: &AccountId,
        password: &str,
    ) -> Result<(), Report<RemoteError>> {
        let req = self
            .client
            .post(self.url("/auth/save"))
            .json(&CredentialsBody { id, password });
        send_checked(SERVICE, req).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_credentials(&self, id: &AccountId) -> Result<(), Report<RemoteError>> {
        let req = self
            .client
            .post(self.url("/auth/delete"))
            .query(&[("id", id.as_str())]);
        send_checked(SERVICE, req).await?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn verify_credentials(
        &self,
        id: &AccountId,
        password: &str,
    ) -> Result<(), Report<RemoteError>> {
        let req = self
            .client
            .post(self.url("/auth/verify"))
            .json(&CredentialsBody { id, password });
        send_checked(SERVICE, req).await.map_err(|e| {
            if matches!(e.current_context().kind, RemoteErrorKind::Status(401 | 403)) {
                e.change_context(RemoteError::new(SERVICE, RemoteErrorKind::Rejected))
            } else {
                e
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn encode_token(&self, id: &AccountId) -> Result<String, Report<RemoteError>> {
        let req = self
            .client
            .post(self.url("/auth/jwt/encode"))
            .json(&EncodeTokenBody { account_id: id });
        let token = send_checked(SERVICE, req)
            .await?
            .text()
            .await
            .change_context(RemoteError::new(SERVICE, RemoteErrorKind::ParsingResponse))?;

        if token.is_empty() {
            return Err(Report::new(RemoteError::new(
                SERVICE,
                RemoteErrorKind::ParsingResponse,
            )))
            .attach_printable("Token response was empty");
        }

        Ok(token)
    }
}
