//! Practitioner identities consumed from the external directory.
//!
//! The credit engine never owns identities. It reads them through [`IdentityDirectory`] and
//! listens for registrations through [`IdentityObserver`] so that legacy credit can be bound
//! once the person it belongs to appears.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier of a practitioner in the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PractitionerId(pub String);

impl fmt::Display for PractitionerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory roles relevant to credit tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Practitioner,
    Emeritus,
    AuxiliaryMinister,
    Reviewer,
    Administrator,
    Member,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Practitioner => "practitioner",
            Role::Emeritus => "emeritus",
            Role::AuxiliaryMinister => "auxiliary_minister",
            Role::Reviewer => "reviewer",
            Role::Administrator => "administrator",
            Role::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "practitioner" => Some(Role::Practitioner),
            "emeritus" => Some(Role::Emeritus),
            "auxiliary_minister" => Some(Role::AuxiliaryMinister),
            "reviewer" => Some(Role::Reviewer),
            "administrator" | "admin" => Some(Role::Administrator),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// Roles that accrue continuing-education credit.
    pub const fn is_credit_eligible(self) -> bool {
        matches!(
            self,
            Role::Practitioner | Role::Emeritus | Role::AuxiliaryMinister
        )
    }

    pub const fn can_review(self) -> bool {
        matches!(self, Role::Reviewer | Role::Administrator)
    }
}

/// Directory entry as seen by the credit engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerIdentity {
    pub id: PractitionerId,
    pub name: String,
    pub surname: String,
    pub role: Role,
}

/// Read access to the authoritative practitioner list.
pub trait IdentityDirectory: Send + Sync {
    fn find(&self, id: &PractitionerId) -> Result<Option<PractitionerIdentity>, DirectoryError>;
    /// Every identity whose role accrues credit.
    fn eligible(&self) -> Result<Vec<PractitionerIdentity>, DirectoryError>;
}

/// Callback fired after an identity has been added to the directory.
pub trait IdentityObserver: Send + Sync {
    fn identity_registered(&self, identity: &PractitionerIdentity);
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
    #[error("identity `{0}` already registered")]
    Duplicate(PractitionerId),
}

/// Directory backed by process memory, used by the bundled service and tests.
///
/// Observers are held weakly so a subscriber that itself reads the directory does not keep
/// the pair alive forever.
#[derive(Default)]
pub struct InMemoryIdentityDirectory {
    identities: Mutex<Vec<PractitionerIdentity>>,
    observers: Mutex<Vec<Weak<dyn IdentityObserver>>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: Vec<PractitionerIdentity>) -> Self {
        Self {
            identities: Mutex::new(identities),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: Weak<dyn IdentityObserver>) -> Result<(), DirectoryError> {
        let mut guard = self.observers.lock().map_err(|_| poisoned())?;
        guard.push(observer);
        Ok(())
    }

    /// Add an identity and notify live observers once the directory lock is released.
    pub fn register(&self, identity: PractitionerIdentity) -> Result<(), DirectoryError> {
        {
            let mut guard = self.identities.lock().map_err(|_| poisoned())?;
            if guard.iter().any(|existing| existing.id == identity.id) {
                return Err(DirectoryError::Duplicate(identity.id));
            }
            guard.push(identity.clone());
        }

        let observers: Vec<Arc<dyn IdentityObserver>> = {
            let mut guard = self.observers.lock().map_err(|_| poisoned())?;
            guard.retain(|observer| observer.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };

        debug!(
            practitioner = %identity.id,
            observers = observers.len(),
            "identity registered"
        );
        for observer in observers {
            observer.identity_registered(&identity);
        }

        Ok(())
    }

    pub fn all(&self) -> Result<Vec<PractitionerIdentity>, DirectoryError> {
        let guard = self.identities.lock().map_err(|_| poisoned())?;
        Ok(guard.clone())
    }
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn find(&self, id: &PractitionerId) -> Result<Option<PractitionerIdentity>, DirectoryError> {
        let guard = self.identities.lock().map_err(|_| poisoned())?;
        Ok(guard.iter().find(|identity| &identity.id == id).cloned())
    }

    fn eligible(&self) -> Result<Vec<PractitionerIdentity>, DirectoryError> {
        let guard = self.identities.lock().map_err(|_| poisoned())?;
        Ok(guard
            .iter()
            .filter(|identity| identity.role.is_credit_eligible())
            .cloned()
            .collect())
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("directory lock poisoned".to_string())
}
