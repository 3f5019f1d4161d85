//! The property store keeps arbitrary attributes for each account, keyed by collection name and
//! record id. Writes go through a [PropertyTransaction], which only reaches the store when it
//! is committed.

use std::fmt::Debug;

use error_stack::{Report, ResultExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

use super::{send_checked, RemoteError, RemoteErrorKind};

const SERVICE: &str = "storage";

/// Collection holding the extra properties of each account.
pub const ACCOUNT_PROPERTIES: &str = "account_properties";

/// The record field the store uses as the record id. Callers may not supply it themselves.
pub const RESERVED_ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyOp {
    Save {
        name: String,
        value: Vec<Map<String, Value>>,
    },
    Delete {
        name: String,
        id: String,
    },
}

#[async_trait::async_trait]
pub trait PropertyStore: Debug + Send + Sync {
    /// Apply a committed batch of writes, in order.
    async fn apply(&self, ops: Vec<PropertyOp>) -> Result<(), Report<RemoteError>>;

    /// Fetch a record. Returns `None` if the store has no record for this id.
    async fn get(&self, name: &str, id: &str) -> Result<Option<Value>, Report<RemoteError>>;
}

/// A batch of writes against the property store. Nothing is sent until [commit](Self::commit)
/// is called; dropping the transaction discards the pending writes.
#[derive(Debug)]
pub struct PropertyTransaction<'a> {
    store: &'a dyn PropertyStore,
    ops: Vec<PropertyOp>,
}

impl<'a> PropertyTransaction<'a> {
    pub fn new(store: &'a dyn PropertyStore) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    pub fn save(&mut self, name: &str, value: Vec<Map<String, Value>>) {
        self.ops.push(PropertyOp::Save {
            name: name.to_string(),
            value,
        });
    }

    pub fn delete(&mut self, name: &str, id: &str) {
        self.ops.push(PropertyOp::Delete {
            name: name.to_string(),
            id: id.to_string(),
        });
    }

    pub async fn commit(mut self) -> Result<(), Report<RemoteError>> {
        let ops = std::mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(());
        }

        self.store.apply(ops).await
    }
}

impl Drop for PropertyTransaction<'_> {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            tracing::debug!(
                count = self.ops.len(),
                "Discarding uncommitted property store writes"
            );
        }
    }
}

/// The HTTP implementation of the property store.
#[derive(Debug, Clone)]
pub struct HttpPropertyStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GetBody<'a> {
    name: &'a str,
    id: &'a str,
}

impl HttpPropertyStore {
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
impl PropertyStore for HttpPropertyStore {
    #[instrument(skip_all, fields(count = ops.len()))]
    async fn apply(&self, ops: Vec<PropertyOp>) -> Result<(), Report<RemoteError>> {
        for op in ops {
            let path = match &op {
                PropertyOp::Save { .. } => "/save",
                PropertyOp::Delete { .. } => "/delete",
            };

            let req = self.client.post(self.url(path)).json(&op);
            send_checked(SERVICE, req).await?;
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, name: &str, id: &str) -> Result<Option<Value>, Report<RemoteError>> {
        let response = self
            .client
            .post(self.url("/get"))
            .json(&GetBody { name, id })
            .send()
            .await
            .change_context(RemoteError::new(SERVICE, RemoteErrorKind::Sending))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(Report::new(RemoteError::new(
                SERVICE,
                RemoteErrorKind::Status(response.status().as_u16()),
            )));
        }

        let value = response
            .json::<Value>()
            .await
            .change_context(RemoteError::new(SERVICE, RemoteErrorKind::ParsingResponse))?;

        Ok(match value {
            Value::Null => None,
            v => Some(v),
        })
    }
}

/// Normalize a property store document into a single attribute map. The store may answer with
/// the record itself or a list of matching records. The reserved id field is removed.
pub fn record_to_properties(value: Option<Value>) -> Map<String, Value> {
    let mut record = match value {
        Some(Value::Object(map)) => map,
        Some(Value::Array(items)) => items
            .into_iter()
            .find_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Map::new(),
    };

    record.remove(RESERVED_ID_FIELD);
    record
}
