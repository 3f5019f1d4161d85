use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use error_stack::Report;
use serde_json::{Map, Value};

use super::{AuthBridge, PropertyOp, PropertyStore, RemoteError, RemoteErrorKind};
use crate::models::account::AccountId;

/// An in-process auth bridge. Passwords are kept in plain text.
#[derive(Debug, Default)]
pub struct FakeAuthBridge {
    pub credentials: Mutex<HashMap<String, String>>,
    pub fail_save: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_encode: AtomicBool,
    /// Milliseconds to wait before answering a save
    pub save_delay_ms: AtomicU64,
    pub save_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeAuthBridge {
    pub fn has_credentials(&self, id: &AccountId) -> bool {
        self.credentials.lock().unwrap().contains_key(id.as_str())
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.lock().unwrap().len()
    }

    fn fail(kind: RemoteErrorKind) -> Report<RemoteError> {
        Report::new(RemoteError::new("bridge", kind))
    }
}

#[async_trait::async_trait]
impl AuthBridge for FakeAuthBridge {
    async fn save_credentials(
        &self,
        id: &AccountId,
        password: &str,
    ) -> Result<(), Report<RemoteError>> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);
        let delay = self.save_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_save.load(Ordering::Relaxed) {
            return Err(Self::fail(RemoteErrorKind::Status(500)));
        }

        self.credentials
            .lock()
            .unwrap()
            .insert(id.to_string(), password.to_string());
        Ok(())
    }

    async fn delete_credentials(&self, id: &AccountId) -> Result<(), Report<RemoteError>> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_delete.load(Ordering::Relaxed) {
            return Err(Self::fail(RemoteErrorKind::Status(500)));
        }

        self.credentials.lock().unwrap().remove(id.as_str());
        Ok(())
    }

    async fn verify_credentials(
        &self,
        id: &AccountId,
        password: &str,
    ) -> Result<(), Report<RemoteError>> {
        let matches = self
            .credentials
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|stored| stored == password)
            .unwrap_or(false);

        if matches {
            Ok(())
        } else {
            Err(Self::fail(RemoteErrorKind::Rejected))
        }
    }

    async fn encode_token(&self, id: &AccountId) -> Result<String, Report<RemoteError>> {
        if self.fail_encode.load(Ordering::Relaxed) {
            return Err(Self::fail(RemoteErrorKind::Sending));
        }

        Ok(format!("token-for-{id}"))
    }
}

/// An in-process property store keyed by (collection, id).
#[derive(Debug, Default)]
pub struct FakePropertyStore {
    pub records: Mutex<HashMap<(String, String), Map<String, Value>>>,
    pub fail_save: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Apply saves but report them as failed, like a response lost after the write landed
    pub lose_save_response: AtomicBool,
}

impl FakePropertyStore {
    pub fn record(&self, name: &str, id: &str) -> Option<Map<String, Value>> {
        self.records
            .lock()
            .unwrap()
            .get(&(name.to_string(), id.to_string()))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PropertyStore for FakePropertyStore {
    async fn apply(&self, ops: Vec<PropertyOp>) -> Result<(), Report<RemoteError>> {
        let fails = ops.iter().any(|op| match op {
            PropertyOp::Save { .. } => self.fail_save.load(Ordering::Relaxed),
            PropertyOp::Delete { .. } => self.fail_delete.load(Ordering::Relaxed),
        });

        if fails {
            return Err(Report::new(RemoteError::new(
                "storage",
                RemoteErrorKind::Status(500),
            )));
        }

        let saves = ops.iter().any(|op| matches!(op, PropertyOp::Save { .. }));
        let mut records = self.records.lock().unwrap();
        for op in ops {
            match op {
                PropertyOp::Save { name, value } => {
                    for record in value {
                        let id = record
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        records.insert((name.clone(), id), record);
                    }
                }
                PropertyOp::Delete { name, id } => {
                    records.remove(&(name, id));
                }
            }
        }

        if saves && self.lose_save_response.load(Ordering::Relaxed) {
            return Err(Report::new(RemoteError::new(
                "storage",
                RemoteErrorKind::Sending,
            )));
        }

        Ok(())
    }

    async fn get(&self, name: &str, id: &str) -> Result<Option<Value>, Report<RemoteError>> {
        Ok(self.record(name, id).map(Value::Object))
    }
}
