//! Multi-party signature generation
//!
//! Multi-party signature generation. Full description of the protocol can be found in ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf), chapters 4.2, 4.3, and Appendix A.
//!
//! The challenging aspect of ECDSA algorithm is in its requirement for unique randomness to be multiplied by private key during the signing so that if each party has both randomness and key additively shared,
//! the product of sums is the sum of products, where each term of the sum contains two values coming from different parties
//! while both values have to be kept private from each other.
//! To overcome this problem the signing protocol uses the multiplication-to-addition conversion, see [`mta`](../mta/index.html).
//!
//! # Details
//!
//! One party of the session is represented by [`LocalParty`]. The party is push-driven: the caller feeds incoming messages into it,
//! and the party emits its own messages and the final signature through two sinks given at construction.
//!
//! * Check what threshold the given key requires and poll parties to collect the quorum. This step is external to the library.
//! * Create [`Parameters`] from the keys of the parties in the quorum and load the key material ( [`MultiPartyInfo`] )
//! * Create [`LocalParty`] and call `start()`
//! * Pass every message received from the network to `update()` or `update_from_bytes()`
//!
//! The protocol runs nine rounds:
//!
//! | round | sends | verifies |
//! |---|---|---|
//! | 1 | $` E_{i}(k_{i}) `$ to each peer, commitment to $` \Gamma_{i} = g^{\gamma_{i}} `$ | ciphertexts |
//! | 2 | `MtA` responses for $` \gamma_{i} `$ and $` w_{i} `$ to each peer | Bob's proofs, computes $` \delta_{i}, \sigma_{i} `$ |
//! | 3 | $` \delta_{i} `$ | $` \delta = \sum \delta_{i} \not = 0 `$ |
//! | 4 | decommitment of $` \Gamma_{i} `$ | decommitments, computes $` R `$ and $` s_{i} `$ |
//! | 5 | commitment to $` V_{i}, A_{i}, B_{i} `$ | |
//! | 6 | decommitment of $` V_{i}, A_{i}, B_{i} `$ | decommitments and ElGamal proofs |
//! | 7 | commitment to $` U_{i}, T_{i} `$ | |
//! | 8 | decommitment of $` U_{i}, T_{i} `$ | decommitments, $` \sum U_{i} = \sum T_{i} `$ |
//! | 9 | $` s_{i} `$ | the signature |
//!
//!  Every party obtains and verifies the complete signature before it is released to the result sink.
//!
//! # Example
//!
//! ```text
//!   let (out_tx, out_rx) = crossbeam_channel::unbounded();
//!   let (end_tx, end_rx) = crossbeam_channel::unbounded();
//!
//!   let params = Parameters::new(&quorum, own_key, threshold)?;
//!   let mut party = LocalParty::new(hash_message(message), params, &key, out_tx, end_tx)?;
//!   party.start()?;
//!   // to do : share out_rx with a network layer and pass received messages to party.update()
//!   let signature = end_rx.recv()?;
//! ```
//!
//! [`LocalParty`]: local_party/struct.LocalParty.html
//! [`Parameters`]: params/struct.Parameters.html
//! [`MultiPartyInfo`]: ../keys/struct.MultiPartyInfo.html
use crate::ecdsa::{MessageHashType, Signature};
use crate::protocol::PartyId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod local_party;
mod local_signature;
pub mod params;
mod rounds;
mod scratch;
pub mod store;
pub mod wire;


pub use crate::ecdsa::messages::{InMsg, Message, OutMsg};
pub use local_party::{LocalParty, Party, PartyStatus};
pub use params::Parameters;

/// The name of the task reported in errors
pub const TASK_NAME: &str = "signing";

/// Enumerates error types which can be raised by signing protocol
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("invalid public key {point}")]
    InvalidPublicKey { point: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("received msg with a sender index too great ({max} < {index})")]
    InvalidSender { index: usize, max: usize },
    #[error("malformed {kind} message from party {party}: {reason}")]
    MalformedMessage {
        party: PartyId,
        kind: String,
        reason: String,
    },
    #[error("cannot parse wire message: {0}")]
    Wire(String),
    #[error("invalid MtA ciphertext, party {party}")]
    InvalidCiphertext { party: PartyId },
    #[error("Bob proof failed, party {party}: {reason}")]
    ProofBobFailed { party: PartyId, reason: String },
    #[error("Bob proof with check failed, party {party}: {reason}")]
    ProofBobWCFailed { party: PartyId, reason: String },
    #[error("invalid decommitment at round {round}, party {party}")]
    InvalidDecommitment { party: PartyId, round: u32 },
    #[error("Dlog proof failed, party {party}")]
    DlogProofFailed { party: PartyId },
    #[error("g^gamma differs from the value used in MtA, party {party}")]
    InconsistentGamma { party: PartyId },
    #[error("invalid ElGamal proof at round 6, party {party}")]
    InvalidElGamalProof { party: PartyId },
    #[error("sum of delta shares is zero")]
    ZeroDelta,
    #[error("nonce point has no affine coordinates")]
    DegenerateNonce,
    #[error("phase5 validation failed")]
    ConsistencyCheckFailed,
    #[error("signature verification failed")]
    SignatureVerificationFailed,
    #[error("missing message {kind} from party {party}")]
    MissingMessage { party: PartyId, kind: &'static str },
    #[error("internal error: {0}")]
    InternalInvariant(String),
}

impl SigningError {
    /// The party to blame for the error, if the error is attributable
    pub fn culprit(&self) -> Option<&PartyId> {
        match self {
            SigningError::MalformedMessage { party, .. }
            | SigningError::InvalidCiphertext { party }
            | SigningError::ProofBobFailed { party, .. }
            | SigningError::ProofBobWCFailed { party, .. }
            | SigningError::InvalidDecommitment { party, .. }
            | SigningError::DlogProofFailed { party }
            | SigningError::InconsistentGamma { party }
            | SigningError::InvalidElGamalProof { party } => Some(party),
            _ => None,
        }
    }
}

/// vector of signing errors
#[derive(Debug)]
pub struct ErrorState {
    errors: Vec<SigningError>,
}

impl ErrorState {
    pub fn new(errors: Vec<SigningError>) -> Self {
        ErrorState { errors }
    }

    pub fn errors(&self) -> &[SigningError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SigningError> {
        self.errors
    }
}

impl From<SigningError> for ErrorState {
    fn from(e: SigningError) -> Self {
        ErrorState::new(vec![e])
    }
}

/// The error reported by [`LocalParty`](local_party/struct.LocalParty.html)
///
/// Carries the name of the task, the round in which the error occurred, the id of the reporting party and every error found in that round.
#[derive(Debug)]
pub struct PartyError {
    task: &'static str,
    round: Option<u32>,
    party: PartyId,
    errors: Vec<SigningError>,
}

impl PartyError {
    pub fn new(round: Option<u32>, party: PartyId, errors: Vec<SigningError>) -> Self {
        PartyError {
            task: TASK_NAME,
            round,
            party,
            errors,
        }
    }

    pub fn task(&self) -> &'static str {
        self.task
    }

    pub fn round(&self) -> Option<u32> {
        self.round
    }

    pub fn party(&self) -> &PartyId {
        &self.party
    }

    pub fn errors(&self) -> &[SigningError] {
        &self.errors
    }

    /// distinct parties blamed by the errors
    pub fn culprits(&self) -> Vec<PartyId> {
        let mut culprits = Vec::new();
        for party in self.errors.iter().filter_map(SigningError::culprit) {
            if !culprits.contains(party) {
                culprits.push(*party);
            }
        }
        culprits
    }
}

impl fmt::Display for PartyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {}, party {}", self.task, self.party)?;
        if let Some(round) = self.round {
            write!(f, ", round {}", round)?;
        }
        write!(f, ":")?;
        for e in &self.errors {
            write!(f, " {};", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartyError {}

/// Signature in (r,s) format, its recovery id, and the hash of the signed message
///
/// `s` is normalized to the lower half of $` Z_{q} `$.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureData {
    pub signature: Signature,
    pub recovery_id: u8,
    pub message_hash: MessageHashType,
}
