//! Multiplication to addition (`MtA`) share conversion
//!
//! Alice holds $` a `$, Bob holds $` b `$. After the exchange Alice holds $` \alpha `$ and Bob holds $` \beta `$ so that
//! $` \alpha + \beta = a b \mod q `$, see chapter 3 of ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf).
//!
//! * Alice sends $` c_{A} = E_{A}(a) `$ encrypted with her Paillier key, see [`MessageA`]
//! * Bob replies with $` c_{B} = b \cdot c_{A} + E_{A}(\beta^{\prime}) `$ and sets $` \beta = -\beta^{\prime} `$, see [`MessageB`]
//! * Alice decrypts $` \alpha = D_{A}(c_{B}) `$
//!
//! Bob proves knowledge of $` b `$ and $` \beta^{\prime} `$ with two Schnorr proofs, the simplified proof as defined in GG18, ch.5 , p.19.
//! In the `MtAwc` mode Alice additionally checks that $` g^{b} `$ equals the public value she expects for Bob.
//!
//! [`MessageA`]: struct.MessageA.html
//! [`MessageB`]: struct.MessageB.html
use crate::ecdsa::signing::SigningError;
use crate::ecdsa::PaillierKeys;
use crate::protocol::PartyId;
use curv::arithmetic::traits::Samplable;
use curv::cryptographic_primitives::proofs::sigma_dlog::{DLogProof, ProveDLog};
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::{
    Add, EncryptWithChosenRandomness, EncryptionKey, Mul, Paillier, Randomness, RawCiphertext,
    RawPlaintext,
};
use serde::{Deserialize, Serialize};
use trace::trace;

/// First message of `MtA` protocol that Alice sends to Bob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageA {
    pub c: BigInt,
}

#[trace(pretty, prefix = "MessageA::")]
impl MessageA {
    /// encrypts Alice's secret `a` with her key
    pub fn new(a: &FE, alice_ek: &EncryptionKey) -> MessageA {
        let r = Randomness::sample(alice_ek);
        let c = Paillier::encrypt_with_chosen_randomness(
            alice_ek,
            RawPlaintext::from(a.to_big_int()),
            &r,
        )
        .0
        .into_owned();
        MessageA { c }
    }

    /// checks that the ciphertext is an element of $` Z^{*}_{N^{2}} `$
    pub fn is_well_formed(&self, alice_ek: &EncryptionKey) -> bool {
        self.c > BigInt::zero() && self.c < alice_ek.nn && self.c.gcd(&alice_ek.n) == BigInt::one()
    }
}

/// Schnorr proofs of $` b `$ and $` \beta^{\prime} `$
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DLogProofs {
    pub b_proof: DLogProof,
    pub beta_tag_proof: DLogProof,
}

/// enumerates the subtype of Bob's proof
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MTAMode {
    MtA,
    MtAwc,
}

/// the response to Alice's messageA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageB {
    pub c: BigInt,
    pub proof: DLogProofs,
}

#[trace(pretty, prefix = "MessageB::")]
impl MessageB {
    /// b  is Bob's secret
    /// returns ( Message, new Bob's secret )
    pub fn new(b: &FE, alice_ek: &EncryptionKey, alice_msg: &MessageA) -> (MessageB, FE) {
        // E(a) * b
        let b_bn = b.to_big_int();
        let b_times_enc_a = Paillier::mul(
            alice_ek,
            RawCiphertext::from(&alice_msg.c),
            RawPlaintext::from(&b_bn),
        );

        let beta_prim = BigInt::sample_below(&alice_ek.n);

        // E(beta_prim)
        let r = Randomness::sample(&alice_ek);
        let enc_beta_prim =
            Paillier::encrypt_with_chosen_randomness(alice_ek, RawPlaintext::from(&beta_prim), &r);

        let mta_out = Paillier::add(alice_ek, b_times_enc_a, enc_beta_prim);

        let beta_prim_fe: FE = ECScalar::from(&beta_prim);
        let beta = FE::zero().sub(&beta_prim_fe.get_element());

        let proof = DLogProofs {
            b_proof: DLogProof::prove(b),
            beta_tag_proof: DLogProof::prove(&beta_prim_fe),
        };

        (
            MessageB {
                c: mta_out.0.into_owned(),
                proof,
            },
            beta,
        )
    }

    /// `true` if the response carries a non-empty ciphertext
    pub fn validate_basic(&self) -> bool {
        self.c > BigInt::zero()
    }
}

/// Verifies Bob's proofs and returns Alice's share $` \alpha `$
///
/// `a` is the value Alice encrypted in her `MessageA`.
pub fn verify_proofs_get_alpha(
    party: &PartyId,
    msg: &MessageB,
    a: &FE,
    alice_keys: &PaillierKeys,
) -> Result<FE, SigningError> {
    verify_bob_proofs(party, msg, a, alice_keys, MTAMode::MtA, None)
}

/// Verifies Bob's proofs, checks that Bob used the secret behind `bob_public`, and returns Alice's share
pub fn verify_proofs_get_alpha_with_check(
    party: &PartyId,
    msg: &MessageB,
    a: &FE,
    alice_keys: &PaillierKeys,
    bob_public: &GE,
) -> Result<FE, SigningError> {
    verify_bob_proofs(party, msg, a, alice_keys, MTAMode::MtAwc, Some(bob_public))
}

#[trace(pretty)]
fn verify_bob_proofs(
    party: &PartyId,
    msg: &MessageB,
    a: &FE,
    alice_keys: &PaillierKeys,
    mode: MTAMode,
    bob_public: Option<&GE>,
) -> Result<FE, SigningError> {
    let failure = |reason: String| match mode {
        MTAMode::MtA => SigningError::ProofBobFailed {
            party: *party,
            reason,
        },
        MTAMode::MtAwc => SigningError::ProofBobWCFailed {
            party: *party,
            reason,
        },
    };

    if msg.c <= BigInt::zero() || msg.c >= alice_keys.ek.nn {
        return Err(failure("ciphertext is out of range".to_string()));
    }
    let alice_share = alice_keys.decrypt(&msg.c).mod_floor(&FE::q());
    if alice_share == BigInt::zero() {
        return Err(failure("decrypted share is zero".to_string()));
    }
    let alpha: FE = ECScalar::from(&alice_share);

    if DLogProof::verify(&msg.proof.b_proof).is_err() {
        return Err(failure("dlog proof of b failed".to_string()));
    }
    if DLogProof::verify(&msg.proof.beta_tag_proof).is_err() {
        return Err(failure("dlog proof of beta' failed".to_string()));
    }
    if let Some(expected) = bob_public {
        if msg.proof.b_proof.pk != *expected {
            return Err(failure("b does not match the public share".to_string()));
        }
    }

    let g: GE = ECPoint::generator();
    let g_alpha = g * alpha;
    let ba_btag = msg.proof.b_proof.pk * *a + msg.proof.beta_tag_proof.pk;
    if ba_btag.get_element() != g_alpha.get_element() {
        return Err(failure(format!(
            "eq doesn't hold, g^alpha {:?}, B^a* B_prim {:?}",
            &g_alpha.get_element(),
            &ba_btag.get_element()
        )));
    }
    Ok(alpha)
}
