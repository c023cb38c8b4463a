use std::collections::HashMap;

use super::normalizer::normalize_name;
use crate::workflows::identity::{PractitionerId, PractitionerIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MatchOutcome {
    Bound(PractitionerId),
    Unbound,
    Ambiguous(Vec<PractitionerId>),
}

/// Exact lookup of eligible identities by normalized name and surname.
///
/// No fuzzy matching: a near miss stays unbound and waits for reconciliation.
#[derive(Debug, Default)]
pub(crate) struct IdentityIndex {
    entries: HashMap<(String, String), Vec<PractitionerId>>,
}

impl IdentityIndex {
    pub(crate) fn from_identities(identities: Vec<PractitionerIdentity>) -> Self {
        let mut entries: HashMap<(String, String), Vec<PractitionerId>> = HashMap::new();
        for identity in identities
            .into_iter()
            .filter(|identity| identity.role.is_credit_eligible())
        {
            let key = (
                normalize_name(&identity.name),
                normalize_name(&identity.surname),
            );
            let ids = entries.entry(key).or_default();
            if !ids.contains(&identity.id) {
                ids.push(identity.id);
            }
        }
        for ids in entries.values_mut() {
            ids.sort();
        }
        Self { entries }
    }

    pub(crate) fn resolve(&self, raw_name: &str, raw_surname: &str) -> MatchOutcome {
        let key = (normalize_name(raw_name), normalize_name(raw_surname));
        match self.entries.get(&key).map(Vec::as_slice) {
            None | Some([]) => MatchOutcome::Unbound,
            Some([only]) => MatchOutcome::Bound(only.clone()),
            Some(many) => MatchOutcome::Ambiguous(many.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::identity::Role;

    fn identity(id: &str, name: &str, surname: &str, role: Role) -> PractitionerIdentity {
        PractitionerIdentity {
            id: PractitionerId(id.to_string()),
            name: name.to_string(),
            surname: surname.to_string(),
            role,
        }
    }

    #[test]
    fn matches_ignore_case_and_spacing() {
        let index = IdentityIndex::from_identities(vec![identity(
            "p-1",
            "Anna",
            "van der Merwe",
            Role::Practitioner,
        )]);
        assert_eq!(
            index.resolve(" ANNA ", "Van  der Merwe"),
            MatchOutcome::Bound(PractitionerId("p-1".to_string()))
        );
        assert_eq!(index.resolve("Ann", "van der Merwe"), MatchOutcome::Unbound);
    }

    #[test]
    fn shared_names_are_ambiguous() {
        let index = IdentityIndex::from_identities(vec![
            identity("p-2", "Johan", "Botha", Role::Practitioner),
            identity("p-1", "Johan", "Botha", Role::Emeritus),
        ]);
        assert_eq!(
            index.resolve("johan", "botha"),
            MatchOutcome::Ambiguous(vec![
                PractitionerId("p-1".to_string()),
                PractitionerId("p-2".to_string()),
            ])
        );
    }

    #[test]
    fn ineligible_roles_never_match() {
        let index = IdentityIndex::from_identities(vec![identity(
            "r-1",
            "Johan",
            "Botha",
            Role::Reviewer,
        )]);
        assert_eq!(index.resolve("Johan", "Botha"), MatchOutcome::Unbound);
    }
}
