use std::sync::Arc;

use super::catalog::ActivityCatalog;
use super::ledger::SubmissionLedger;
use super::report::CreditReporter;
use super::repository::{CreditStore, RepositoryError};
use super::review::ReviewEngine;
use crate::config::CreditPolicy;
use crate::workflows::historical::HistoricalImporter;
use crate::workflows::identity::{DirectoryError, IdentityDirectory, IdentityObserver};

/// Facade wiring every credit component to one store and one identity directory.
pub struct CreditEngine<S, D> {
    catalog: ActivityCatalog<S>,
    ledger: SubmissionLedger<S, D>,
    reviews: ReviewEngine<S>,
    historical: Arc<HistoricalImporter<S, D>>,
    reporter: CreditReporter<S, D>,
    policy: CreditPolicy,
}

impl<S, D> CreditEngine<S, D>
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, policy: CreditPolicy) -> Self {
        Self {
            catalog: ActivityCatalog::new(store.clone()),
            ledger: SubmissionLedger::new(store.clone(), directory.clone(), policy),
            reviews: ReviewEngine::new(store.clone(), policy),
            historical: Arc::new(HistoricalImporter::new(
                store.clone(),
                directory.clone(),
                policy,
            )),
            reporter: CreditReporter::new(store, directory, policy),
            policy,
        }
    }

    pub fn catalog(&self) -> &ActivityCatalog<S> {
        &self.catalog
    }

    pub fn ledger(&self) -> &SubmissionLedger<S, D> {
        &self.ledger
    }

    pub fn reviews(&self) -> &ReviewEngine<S> {
        &self.reviews
    }

    pub fn historical(&self) -> &HistoricalImporter<S, D> {
        &self.historical
    }

    pub fn reporter(&self) -> &CreditReporter<S, D> {
        &self.reporter
    }

    pub fn policy(&self) -> CreditPolicy {
        self.policy
    }

    /// Observer handle to subscribe with the identity directory so new registrations
    /// trigger reconciliation of unbound legacy records.
    pub fn reconciliation_observer(&self) -> Arc<dyn IdentityObserver> {
        self.historical.clone()
    }
}

/// Error raised by the credit services.
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl CreditError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
