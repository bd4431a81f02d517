//! Parameters of one signing session
use crate::ecdsa::signing::SigningError;
use crate::protocol::{PartyId, PartyKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The parties of the session, the local party and the threshold
///
/// Parties are sorted by key, and the position in that order is the session index of the party.
/// The threshold is the degree of the sharing polynomial, so that the session needs at least `threshold + 1` parties.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameters {
    parties: Vec<PartyId>,
    own: PartyId,
    threshold: usize,
}

impl Parameters {
    pub fn new(
        parties: &[PartyKey],
        own_key: PartyKey,
        threshold: usize,
    ) -> Result<Self, SigningError> {
        if parties.len() < 2 {
            return Err(SigningError::InvalidParameters(format!(
                "Number of parties must be at least 2, got {}",
                parties.len()
            )));
        }
        if threshold == 0 {
            return Err(SigningError::InvalidParameters(
                "Threshold must be at least 1".to_string(),
            ));
        }
        if parties.len() < threshold + 1 {
            return Err(SigningError::InvalidParameters(format!(
                "Number of parties {} is less than threshold + 1 = {}",
                parties.len(),
                threshold + 1
            )));
        }

        let mut sorted = parties.to_vec();
        sorted.sort();
        if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(SigningError::InvalidParameters(
                "Party keys must be unique".to_string(),
            ));
        }

        let parties = sorted
            .into_iter()
            .enumerate()
            .map(|(index, key)| PartyId::new(key, index))
            .collect::<Vec<_>>();
        let own = parties
            .iter()
            .find(|p| p.key == own_key)
            .copied()
            .ok_or_else(|| {
                SigningError::InvalidParameters(format!(
                    "Own key {} is not in the list of parties",
                    own_key
                ))
            })?;

        Ok(Parameters {
            parties,
            own,
            threshold,
        })
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn own_id(&self) -> &PartyId {
        &self.own
    }

    pub fn own_index(&self) -> usize {
        self.own.index
    }

    pub fn parties(&self) -> &[PartyId] {
        &self.parties
    }

    pub fn party(&self, index: usize) -> Option<&PartyId> {
        self.parties.get(index)
    }

    /// all parties except the local one
    pub fn peers(&self) -> impl Iterator<Item = &PartyId> {
        let own = self.own.index;
        self.parties.iter().filter(move |p| p.index != own)
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{threshold: {}, party_count: {}, own_index: {}}}",
            self.threshold,
            self.parties.len(),
            self.own.index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Parameters;
    use crate::protocol::PartyKey;

    #[test]
    fn indices_follow_key_order() -> anyhow::Result<()> {
        let keys = vec![PartyKey::from(30), PartyKey::from(10), PartyKey::from(20)];
        let params = Parameters::new(&keys, PartyKey::from(20), 2)?;
        assert_eq!(params.party_count(), 3);
        assert_eq!(params.own_index(), 1);
        assert_eq!(params.party(0).map(|p| p.key), Some(PartyKey::from(10)));
        assert_eq!(params.party(2).map(|p| p.key), Some(PartyKey::from(30)));
        assert!(params.party(3).is_none());
        assert_eq!(
            params.peers().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        Ok(())
    }

    #[test]
    fn rejects_invalid_input() {
        let keys = (1..=3).map(PartyKey::from).collect::<Vec<_>>();
        assert!(Parameters::new(&keys[..1], keys[0], 1).is_err());
        assert!(Parameters::new(&keys, keys[0], 0).is_err());
        assert!(Parameters::new(&keys, keys[0], 3).is_err());
        assert!(Parameters::new(&keys, PartyKey::from(4), 1).is_err());
        let duplicates = vec![keys[0], keys[1], keys[1]];
        assert!(Parameters::new(&duplicates, keys[0], 1).is_err());
        assert!(Parameters::new(&keys, keys[2], 2).is_ok());
    }
}
