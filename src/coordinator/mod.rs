//! Operations that span the local database and the remote collaborators.
//!
//! The database transaction takes the write lock when it opens and is committed last, so
//! sagas run one at a time against the database. Each remote side effect registers a
//! compensation, and if a later step fails the transaction is rolled back and the compensations
//! run newest first.

use std::future::Future;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;

use crate::{remote::RemoteError, Error};

pub mod account;

pub use account::AccountCoordinator;

type Compensation = BoxFuture<'static, Result<(), Report<RemoteError>>>;

/// Undo actions for remote side effects that have already happened.
#[derive(Default)]
pub struct Compensations {
    steps: Vec<(&'static str, Compensation)>,
}

impl std::fmt::Debug for Compensations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|(step, _)| step))
            .finish()
    }
}

impl Compensations {
    pub fn push(
        &mut self,
        step: &'static str,
        action: impl Future<Output = Result<(), Report<RemoteError>>> + Send + 'static,
    ) {
        self.steps.push((step, Box::pin(action)));
    }

    /// Run every registered action, newest first. A failing action is logged and the rest
    /// still run. Returns the number of actions that failed.
    pub async fn run(self) -> usize {
        let mut failed = 0;
        for (step, action) in self.steps.into_iter().rev() {
            match action.await {
                Ok(()) => tracing::info!(step, "Compensation applied"),
                Err(e) => {
                    failed += 1;
                    tracing::error!(step, error = ?e, "Compensation failed");
                }
            }
        }

        failed
    }
}

/// Run a multi-step operation on its own task, so that the caller going away can't stop it
/// between a remote side effect and the matching compensation.
pub async fn run_detached<T, F>(operation: F) -> Result<T, Report<Error>>
where
    T: Send + 'static,
    F: Future<Output = Result<T, Report<Error>>> + Send + 'static,
{
    tokio::spawn(operation).await.change_context(Error::Task)?
}
