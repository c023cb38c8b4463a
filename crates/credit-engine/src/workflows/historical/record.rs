use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalizer::normalize_name;
use crate::workflows::credits::domain::CreditAmount;
use crate::workflows::identity::PractitionerId;

/// Identifier wrapper for imported legacy credit rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistoricalRecordId(pub String);

impl fmt::Display for HistoricalRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Legacy credit entry. Only the practitioner reference may change, and only from unset to set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalCreditRecord {
    pub id: HistoricalRecordId,
    pub raw_name: String,
    pub raw_surname: String,
    practitioner_id: Option<PractitionerId>,
    pub period: i32,
    pub credit_amount: CreditAmount,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl HistoricalCreditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: HistoricalRecordId,
        raw_name: String,
        raw_surname: String,
        practitioner_id: Option<PractitionerId>,
        period: i32,
        credit_amount: CreditAmount,
        description: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            raw_name,
            raw_surname,
            practitioner_id,
            period,
            credit_amount,
            description,
            created_at,
        }
    }

    pub fn practitioner_id(&self) -> Option<&PractitionerId> {
        self.practitioner_id.as_ref()
    }

    pub const fn linked(&self) -> bool {
        self.practitioner_id.is_some()
    }

    /// Attach the record to a practitioner. A bound record never changes owner.
    pub fn bind(&mut self, practitioner_id: PractitionerId) -> Result<(), AlreadyBound> {
        match &self.practitioner_id {
            Some(existing) => Err(AlreadyBound {
                record_id: self.id.clone(),
                practitioner_id: existing.clone(),
            }),
            None => {
                self.practitioner_id = Some(practitioner_id);
                Ok(())
            }
        }
    }

    pub fn duplicate_keys(&self) -> Vec<DuplicateKey> {
        DuplicateKey::for_row(
            self.practitioner_id.as_ref(),
            &self.raw_name,
            &self.raw_surname,
            self.period,
            self.credit_amount,
        )
    }

    pub fn view(&self) -> HistoricalRecordView {
        HistoricalRecordView {
            record_id: self.id.clone(),
            raw_name: self.raw_name.clone(),
            raw_surname: self.raw_surname.clone(),
            practitioner_id: self.practitioner_id.clone(),
            linked: self.linked(),
            period: self.period,
            credit_amount: self.credit_amount,
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("historical record `{record_id}` is already bound to `{practitioner_id}`")]
pub struct AlreadyBound {
    pub record_id: HistoricalRecordId,
    pub practitioner_id: PractitionerId,
}

/// Owner part of a duplicate key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordOwner {
    Practitioner(PractitionerId),
    RawName(String),
}

/// Tuple used to recognise a legacy row that was already imported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub owner: RecordOwner,
    pub surname: String,
    pub period: i32,
    pub credit_amount: CreditAmount,
}

impl DuplicateKey {
    /// Keys under which a row counts as already imported: its raw name always, and its
    /// practitioner once bound. Two rows are duplicates when any of their keys coincide.
    pub fn for_row(
        practitioner_id: Option<&PractitionerId>,
        raw_name: &str,
        raw_surname: &str,
        period: i32,
        credit_amount: CreditAmount,
    ) -> Vec<Self> {
        let surname = normalize_name(raw_surname);
        let mut keys = vec![Self {
            owner: RecordOwner::RawName(normalize_name(raw_name)),
            surname: surname.clone(),
            period,
            credit_amount,
        }];
        if let Some(id) = practitioner_id {
            keys.push(Self {
                owner: RecordOwner::Practitioner(id.clone()),
                surname,
                period,
                credit_amount,
            });
        }
        keys
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalRecordView {
    pub record_id: HistoricalRecordId,
    pub raw_name: String,
    pub raw_surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practitioner_id: Option<PractitionerId>,
    pub linked: bool,
    pub period: i32,
    pub credit_amount: CreditAmount,
    pub description: String,
}

/// Which slice of the historical ledger to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFilter {
    #[default]
    All,
    Bound,
    Unbound,
}

impl LinkFilter {
    pub fn admits(self, record: &HistoricalCreditRecord) -> bool {
        match self {
            LinkFilter::All => true,
            LinkFilter::Bound => record.linked(),
            LinkFilter::Unbound => !record.linked(),
        }
    }
}
