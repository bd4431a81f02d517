//! Long-term key material and its view for one signing session
//!
//! Key generation is external to the crate. Its output, [`MultiPartyInfo`], has to be saved to a wallet/vault
//! and loaded by the caller before signing. A signing session involves only some of the parties which hold shares of the key,
//! so the material is trimmed to the session's parties and re-indexed by their session index, see [`MultiPartyInfo::subset`].
//!
//! [`MultiPartyInfo`]: struct.MultiPartyInfo.html
//! [`MultiPartyInfo::subset`]: struct.MultiPartyInfo.html#method.subset
use crate::ecdsa::signing::params::Parameters;
use crate::ecdsa::signing::SigningError;
use crate::ecdsa::{is_valid_curve_point, PaillierKeys};
use crate::protocol::PartyKey;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::EncryptionKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use trace::trace;
use zeroize::Zeroize;

/// The share of the secret key: the x-coordinate of the point on the sharing polynomial and the value at that point
pub type SecretShare = (usize, FE);

/// Parameters associated with shared key in threshold schema
///
/// # Key Attributes
///
/// * `share count` - number of parties which hold shards of the key
/// * `threshold` - number of parties required to produce a signature minus 1 so that $` \min N_{required} = threshold + 1 `$
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct KeyParameters {
    threshold: usize,   //t
    share_count: usize, //n
}

impl KeyParameters {
    /// Constructs new parameters conditioned they satisfy `1 <= threshold < share_count`.
    pub fn new(threshold: usize, share_count: usize) -> Result<Self, SigningError> {
        if share_count < 2 {
            return Err(SigningError::InvalidParameters(format!(
                "Number of shares must be at least 2, got {}",
                share_count
            )));
        }
        if threshold == 0 || threshold >= share_count {
            return Err(SigningError::InvalidParameters(format!(
                "Threshold {} must be in range [1, {})",
                threshold, share_count
            )));
        }
        Ok(KeyParameters {
            threshold,
            share_count,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn share_count(&self) -> usize {
        self.share_count
    }
}

impl fmt::Display for KeyParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{threshold: {}, share_count: {}}}",
            self.threshold, self.share_count
        )
    }
}

/// Maps [`PartyKey`] to the x-coordinate of its share on the sharing polynomial
///
/// Used in the calculation of Lagrange's coefficients in the signing protocol as only some parties take part in it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Party2PointMap {
    pub points: HashMap<PartyKey, usize>,
}

impl Party2PointMap {
    #[trace(pretty)]
    pub fn map_signing_parties_to_points(
        &self,
        signing_parties: &[PartyKey],
    ) -> Result<Vec<usize>, SigningError> {
        signing_parties
            .iter()
            .map(|key| {
                self.points.get(key).copied().ok_or_else(|| {
                    SigningError::InvalidKey(format!("no share point for party {}", key))
                })
            })
            .collect()
    }
}

/// Lagrange coefficient of `own_x` at zero over the set `points`
///
/// ```math
/// \lambda_{i} = \prod_{j \not = i} \frac{x_{j}}{x_{j} - x_{i}}
/// ```
pub fn lagrange_coefficient(points: &[FE], own_x: &FE) -> FE {
    let fold_with_one = |op: &dyn Fn(FE, &FE) -> FE| {
        points
            .iter()
            .filter(|x| (*x).get_element() != own_x.get_element())
            .fold(ECScalar::from(&BigInt::one()), |acc: FE, x| op(acc, x))
    };

    let num_fun = |acc: FE, x: &FE| acc * x;
    let denom_fun = |acc: FE, x: &FE| acc * x.sub(&own_x.get_element());

    fold_with_one(&denom_fun).invert() * fold_with_one(&num_fun)
}

/// Comprises outputs of key generation protocol which the signing needs
///
/// The value is the input parameter for signing protocol.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct MultiPartyInfo {
    pub key_params: KeyParameters,
    pub own_party_key: PartyKey,
    pub secret_share: SecretShare,
    pub public_key: GE,
    pub own_he_keys: PaillierKeys,
    pub party_he_keys: HashMap<PartyKey, EncryptionKey>,
    pub party_to_point_map: Party2PointMap,
    pub public_shares: HashMap<PartyKey, GE>,
}

impl MultiPartyInfo {
    pub fn own_point(&self) -> usize {
        self.secret_share.0
    }
    pub fn own_share(&self) -> FE {
        self.secret_share.1
    }

    /// Trims the key material to the parties of the signing session
    ///
    /// Every vector of the resulting view is indexed by the session index of a party.
    pub fn subset(&self, params: &Parameters) -> Result<KeyShareView, SigningError> {
        if self.key_params.threshold() != params.threshold() {
            return Err(SigningError::InvalidParameters(format!(
                "key threshold {} differs from the session threshold {}",
                self.key_params.threshold(),
                params.threshold()
            )));
        }
        if self.own_party_key != params.own_id().key {
            return Err(SigningError::InvalidKey(format!(
                "key belongs to party {}, session runs as {}",
                self.own_party_key,
                params.own_id().key
            )));
        }
        if !is_valid_curve_point(self.public_key.get_element()) {
            return Err(SigningError::InvalidPublicKey {
                point: format!("{:?}", self.public_key),
            });
        }
        if !PaillierKeys::is_valid(&self.own_he_keys.ek, &self.own_he_keys.dk) {
            return Err(SigningError::InvalidKey(
                "own Paillier key pair is not consistent".to_string(),
            ));
        }

        let session_keys = params.parties().iter().map(|p| p.key).collect::<Vec<_>>();
        let points = self
            .party_to_point_map
            .map_signing_parties_to_points(&session_keys)?;
        if points.contains(&0) {
            return Err(SigningError::InvalidKey(
                "share point 0 is the secret itself".to_string(),
            ));
        }
        let mut distinct = points.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() != points.len() {
            return Err(SigningError::InvalidKey(format!(
                "parties of the session share points {:?}",
                points
            )));
        }

        let he_keys = session_keys
            .iter()
            .map(|key| {
                self.party_he_keys.get(key).cloned().ok_or_else(|| {
                    SigningError::InvalidKey(format!("no Paillier key for party {}", key))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let big_xs = session_keys
            .iter()
            .map(|key| {
                self.public_shares.get(key).copied().ok_or_else(|| {
                    SigningError::InvalidKey(format!("no public share for party {}", key))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let own_index = params.own_index();
        if points[own_index] != self.own_point() {
            return Err(SigningError::InvalidKey(format!(
                "own share point {} is mapped to {}",
                self.own_point(),
                points[own_index]
            )));
        }
        let g: GE = ECPoint::generator();
        if g * self.own_share() != big_xs[own_index] {
            return Err(SigningError::InvalidKey(
                "own share does not match its public share".to_string(),
            ));
        }

        Ok(KeyShareView {
            threshold: self.key_params.threshold(),
            own_index,
            own_share: self.own_share(),
            points,
            he_keys,
            own_he_keys: self.own_he_keys.clone(),
            big_xs,
            public_key: self.public_key,
        })
    }
}

/// Key material of one party restricted to the parties of a signing session
///
/// `points`, `he_keys` and `big_xs` are indexed by session index.
#[derive(Clone)]
pub struct KeyShareView {
    pub threshold: usize,
    pub own_index: usize,
    pub own_share: FE,
    pub points: Vec<usize>,
    pub he_keys: Vec<EncryptionKey>,
    pub own_he_keys: PaillierKeys,
    pub big_xs: Vec<GE>,
    pub public_key: GE,
}

impl KeyShareView {
    fn points_as_fe(&self) -> Vec<FE> {
        self.points
            .iter()
            .map(|x| ECScalar::from(&BigInt::from(*x as u64)))
            .collect()
    }

    /// Lagrange coefficient of the party at session index `index` over the session's parties
    pub fn lagrange_coefficient(&self, index: usize) -> FE {
        let points = self.points_as_fe();
        lagrange_coefficient(&points, &points[index])
    }

    /// Additive share $` w_{i} = \lambda_{i} x_{i} `$ of the secret key among the session's parties
    pub fn additive_share(&self) -> FE {
        self.own_share * self.lagrange_coefficient(self.own_index)
    }

    /// Public counterparts $` W_{j} = g^{w_{j}} `$ of every party's additive share
    pub fn additive_public_shares(&self) -> Vec<GE> {
        let points = self.points_as_fe();
        self.big_xs
            .iter()
            .zip(points.iter())
            .map(|(big_x, x)| *big_x * lagrange_coefficient(&points, x))
            .collect()
    }

    /// Shifts the key by `delta` so that the session signs for $` Y + g^{\delta} `$
    ///
    /// Lagrange coefficients of any quorum sum to one, so adding `delta` to every share moves the shared secret by `delta`.
    pub fn derive(&mut self, delta: &FE) {
        if *delta == FE::zero() {
            return;
        }
        let g: GE = ECPoint::generator();
        let g_delta = g * *delta;
        self.own_share = self.own_share + *delta;
        self.big_xs = self.big_xs.iter().map(|x| *x + g_delta).collect();
        self.public_key = self.public_key + g_delta;
    }
}

impl Drop for KeyShareView {
    fn drop(&mut self) {
        self.own_share.zeroize();
    }
}

impl fmt::Debug for KeyShareView {
    /// hides the secret share
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShareView")
            .field("threshold", &self.threshold)
            .field("own_index", &self.own_index)
            .field("own_share", &"[***]".to_owned())
            .field("points", &self.points)
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Trusted dealer which splits a fresh key among parties, test only
#[cfg(test)]
pub(crate) mod dealer {
    use super::{KeyParameters, MultiPartyInfo, Party2PointMap};
    use crate::ecdsa::PaillierKeys;
    use crate::protocol::PartyKey;
    use curv::elliptic::curves::traits::{ECPoint, ECScalar};
    use curv::{BigInt, FE, GE};
    use std::collections::HashMap;

    /// Returns the public key and the key material of each party in the order of `keys`
    pub fn deal(threshold: usize, keys: &[PartyKey]) -> (GE, Vec<MultiPartyInfo>) {
        let g: GE = ECPoint::generator();
        let coefficients = (0..=threshold)
            .map(|_| ECScalar::new_random())
            .collect::<Vec<FE>>();
        let public_key = g * coefficients[0];

        let q = FE::q();
        let shares = (1..=keys.len())
            .map(|x| {
                let x = BigInt::from(x as u32);
                let value = coefficients.iter().rev().fold(BigInt::zero(), |acc, c| {
                    (acc * &x + c.to_big_int()).mod_floor(&q)
                });
                ECScalar::from(&value)
            })
            .collect::<Vec<FE>>();

        let he_keys = keys.iter().map(|_| PaillierKeys::random()).collect::<Vec<_>>();
        let party_he_keys = keys
            .iter()
            .zip(he_keys.iter())
            .map(|(key, pk)| (*key, pk.ek.clone()))
            .collect::<HashMap<_, _>>();
        let points = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (*key, i + 1))
            .collect::<HashMap<_, _>>();
        let public_shares = keys
            .iter()
            .zip(shares.iter())
            .map(|(key, share)| (*key, g * *share))
            .collect::<HashMap<_, _>>();

        let key_params = KeyParameters::new(threshold, keys.len()).expect("valid parameters");
        let infos = keys
            .iter()
            .zip(shares.into_iter())
            .zip(he_keys.into_iter())
            .enumerate()
            .map(|(i, ((key, share), own_he_keys))| MultiPartyInfo {
                key_params,
                own_party_key: *key,
                secret_share: (i + 1, share),
                public_key,
                own_he_keys,
                party_he_keys: party_he_keys.clone(),
                party_to_point_map: Party2PointMap {
                    points: points.clone(),
                },
                public_shares: public_shares.clone(),
            })
            .collect();
        (public_key, infos)
    }
}

#[cfg(test)]
mod tests {
    use super::dealer::deal;
    use super::{lagrange_coefficient, KeyParameters};
    use crate::ecdsa::signing::params::Parameters;
    use crate::ecdsa::signing::SigningError;
    use crate::protocol::PartyKey;
    use curv::elliptic::curves::traits::{ECPoint, ECScalar};
    use curv::{BigInt, FE, GE};

    #[test]
    fn key_parameters() {
        assert!(KeyParameters::new(1, 2).is_ok());
        assert!(KeyParameters::new(0, 2).is_err());
        assert!(KeyParameters::new(2, 2).is_err());
        assert!(KeyParameters::new(1, 1).is_err());
    }

    #[test]
    fn lagrange_coefficients_sum_to_one() {
        let points = [1u32, 3, 4]
            .iter()
            .map(|x| ECScalar::from(&BigInt::from(*x)))
            .collect::<Vec<FE>>();
        let sum = points
            .iter()
            .map(|x| lagrange_coefficient(&points, x))
            .fold(FE::zero(), |acc, l| acc + l);
        assert_eq!(sum.to_big_int(), BigInt::one());
    }

    #[test]
    fn subset_reconstructs_public_key() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let keys = (1..=3).map(PartyKey::from).collect::<Vec<_>>();
        let (public_key, infos) = deal(1, &keys);

        // parties 1 and 3 sign
        let session = [keys[0], keys[2]];
        let params = Parameters::new(&session, keys[2], 1)?;
        let view = infos[2].subset(&params)?;
        assert_eq!(view.own_index, 1);
        assert_eq!(view.points, vec![1, 3]);

        let ws = view.additive_public_shares();
        assert_eq!(ws[0] + ws[1], public_key);
        let g: GE = ECPoint::generator();
        assert_eq!(g * view.additive_share(), ws[1]);
        Ok(())
    }

    #[test]
    fn subset_rejects_foreign_material() -> anyhow::Result<()> {
        let keys = (1..=3).map(PartyKey::from).collect::<Vec<_>>();
        let (_, infos) = deal(1, &keys);

        let params = Parameters::new(&keys, keys[0], 1)?;
        assert!(infos[1].subset(&params).is_err());

        let params = Parameters::new(&keys, keys[0], 2)?;
        assert!(infos[0].subset(&params).is_err());

        let mut unknown = keys.clone();
        unknown[2] = PartyKey::from(42);
        let params = Parameters::new(&unknown, keys[0], 1)?;
        assert!(infos[0].subset(&params).is_err());
        Ok(())
    }

    #[test]
    fn subset_rejects_shared_points() -> anyhow::Result<()> {
        let keys = (1..=3).map(PartyKey::from).collect::<Vec<_>>();
        let (_, mut infos) = deal(1, &keys);
        let params = Parameters::new(&keys, keys[0], 1)?;

        infos[0].party_to_point_map.points.insert(keys[2], 2);
        assert!(matches!(
            infos[0].subset(&params),
            Err(SigningError::InvalidKey(_))
        ));

        infos[0].party_to_point_map.points.insert(keys[2], 0);
        assert!(matches!(
            infos[0].subset(&params),
            Err(SigningError::InvalidKey(_))
        ));
        Ok(())
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn large_points_are_not_truncated() -> anyhow::Result<()> {
        let keys = (1..=2).map(PartyKey::from).collect::<Vec<_>>();
        let (_, infos) = deal(1, &keys);
        let params = Parameters::new(&keys, keys[0], 1)?;
        let mut view = infos[0].subset(&params)?;

        // 2^32 + 1 wraps to 1 as u32, which would collide with the first point
        let big = (1usize << 32) + 1;
        view.points = vec![1, big];
        let lambda = view.lagrange_coefficient(0);
        let numerator: FE = ECScalar::from(&BigInt::from(big as u64));
        let denominator: FE = ECScalar::from(&BigInt::from(big as u64 - 1));
        assert_eq!(lambda, numerator * denominator.invert());
        Ok(())
    }

    #[test]
    fn derivation_shifts_public_key() -> anyhow::Result<()> {
        let keys = (1..=2).map(PartyKey::from).collect::<Vec<_>>();
        let (public_key, infos) = deal(1, &keys);
        let params = Parameters::new(&keys, keys[0], 1)?;
        let mut view = infos[0].subset(&params)?;
        let delta: FE = ECScalar::new_random();
        view.derive(&delta);

        let g: GE = ECPoint::generator();
        assert_eq!(view.public_key, public_key + g * delta);
        let ws = view.additive_public_shares();
        assert_eq!(ws[0] + ws[1], view.public_key);
        assert_eq!(g * view.own_share, view.big_xs[0]);
        Ok(())
    }
}
