//! Intermediate values of one signing session
//!
//! Each round writes the values it produces exactly once and later rounds read them.
//! Secrets are erased when the session finishes or fails, see [`ScratchData::discard`].
use crate::ecdsa::messages::{Phase5Com1, Phase5Com2, Phase5Decom1, Phase5Decom2, SignRound2};
use crate::ecdsa::mta::MessageA;
use crate::ecdsa::signing::local_signature::LocalSignature;
use crate::ecdsa::signing::SigningError;
use crate::ecdsa::{CommitmentScheme, MessageHashType};
use curv::arithmetic::traits::ZeroizeBN;
use curv::{BigInt, FE, GE};
use zeroize::Zeroize;

/// Produced by round 1
pub(crate) struct Round1Data {
    /// additive share of the key $` w_{i} = \lambda_{i} x_{i} `$
    pub w_i: FE,
    /// $` W_{j} = g^{w_{j}} `$ for every party
    pub big_ws: Vec<GE>,
    pub k_i: FE,
    pub gamma_i: FE,
    pub g_gamma_i: GE,
    pub gamma_commitment: CommitmentScheme,
    /// $` E_{i}(k_{i}) `$ sent to each peer
    pub mta_requests: Vec<Option<MessageA>>,
}

impl Drop for Round1Data {
    fn drop(&mut self) {
        self.w_i.zeroize();
        self.k_i.zeroize();
        self.gamma_i.zeroize();
        self.gamma_commitment.decomm.zeroize_bn();
    }
}

/// Commitments to $` \Gamma_{j} `$ accepted by round 1, indexed by peer
pub(crate) struct PeerCommitments {
    pub gamma_commitments: Vec<Option<BigInt>>,
}

/// Produced by the start of round 2, indexed by peer
pub(crate) struct Round2Data {
    pub betas: Vec<Option<FE>>,
    pub nus: Vec<Option<FE>>,
    pub responses: Vec<Option<SignRound2>>,
}

impl Drop for Round2Data {
    fn drop(&mut self) {
        for v in self.betas.iter_mut().chain(self.nus.iter_mut()).flatten() {
            v.zeroize();
        }
    }
}

/// Produced by round 2
pub(crate) struct Round3Data {
    /// $` \delta_{i} = k_{i}\gamma_{i} + \sum_{j \not = i} (\alpha_{ij} + \beta_{ji}) `$
    pub delta_i: FE,
    /// $` \sigma_{i} = k_{i}w_{i} + \sum_{j \not = i} (\mu_{ij} + \nu_{ji}) `$
    pub sigma_i: FE,
    /// $` \Gamma_{j} `$ each peer proved knowledge of in its `MtA` response
    pub mta_gammas: Vec<Option<GE>>,
}

impl Drop for Round3Data {
    fn drop(&mut self) {
        self.delta_i.zeroize();
        self.sigma_i.zeroize();
    }
}

/// Produced by round 3
pub(crate) struct Round4Data {
    pub delta_inv: FE,
}

/// Produced by round 4
pub(crate) struct Round5Data {
    pub local_sig: LocalSignature,
    pub commitment: Phase5Com1,
    pub decommitment: Phase5Decom1,
}

/// Produced by round 6
#[allow(non_snake_case)]
pub(crate) struct Round6Data {
    pub V: GE,
    pub A: GE,
}

/// Produced by the start of round 7
pub(crate) struct Round7Data {
    pub commitment: Phase5Com2,
    pub decommitment: Phase5Decom2,
}

/// Workspace of one signing session
pub(crate) struct ScratchData {
    pub message_hash: MessageHashType,
    pub key_derivation_delta: Option<FE>,
    round1: Option<Round1Data>,
    peer_commitments: Option<PeerCommitments>,
    round2: Option<Round2Data>,
    round3: Option<Round3Data>,
    round4: Option<Round4Data>,
    round5: Option<Round5Data>,
    round6: Option<Round6Data>,
    round7: Option<Round7Data>,
}

fn write_once<T>(slot: &mut Option<T>, value: T, what: &str) -> Result<(), SigningError> {
    if slot.is_some() {
        return Err(SigningError::InternalInvariant(format!(
            "{} is written twice",
            what
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn read<'a, T>(slot: &'a Option<T>, what: &str) -> Result<&'a T, SigningError> {
    slot.as_ref()
        .ok_or_else(|| SigningError::InternalInvariant(format!("{} is not available yet", what)))
}

macro_rules! scratch_slot {
    ($get:ident, $set:ident, $field:ident, $ty:ty, $what:expr) => {
        pub fn $get(&self) -> Result<&$ty, SigningError> {
            read(&self.$field, $what)
        }

        pub fn $set(&mut self, value: $ty) -> Result<(), SigningError> {
            write_once(&mut self.$field, value, $what)
        }
    };
}

impl ScratchData {
    pub fn new(message_hash: MessageHashType, key_derivation_delta: Option<FE>) -> Self {
        ScratchData {
            message_hash,
            key_derivation_delta,
            round1: None,
            peer_commitments: None,
            round2: None,
            round3: None,
            round4: None,
            round5: None,
            round6: None,
            round7: None,
        }
    }

    scratch_slot!(round1, set_round1, round1, Round1Data, "round 1 data");
    scratch_slot!(
        peer_commitments,
        set_peer_commitments,
        peer_commitments,
        PeerCommitments,
        "peer commitments"
    );
    scratch_slot!(round2, set_round2, round2, Round2Data, "round 2 data");
    scratch_slot!(round3, set_round3, round3, Round3Data, "round 3 data");
    scratch_slot!(round4, set_round4, round4, Round4Data, "round 4 data");
    scratch_slot!(round5, set_round5, round5, Round5Data, "round 5 data");
    scratch_slot!(round6, set_round6, round6, Round6Data, "round 6 data");
    scratch_slot!(round7, set_round7, round7, Round7Data, "round 7 data");

    /// number of stored sets of values
    pub fn filled(&self) -> usize {
        [
            self.round1.is_some(),
            self.peer_commitments.is_some(),
            self.round2.is_some(),
            self.round3.is_some(),
            self.round4.is_some(),
            self.round5.is_some(),
            self.round6.is_some(),
            self.round7.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count()
    }

    /// drops every stored set, erasing the secrets in it, and returns how many there were
    ///
    /// The message hash and the key derivation delta are kept.
    pub fn discard(&mut self) -> usize {
        let filled = self.filled();
        *self = ScratchData::new(self.message_hash, self.key_derivation_delta);
        filled
    }
}
