//!  Multiparty threshold signature scheme
//!
//!  MPC TS scheme, as defined in ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf)
//!
//!  The module implements the signing side of the scheme:
//! * long-term key material and its per-session view, see [`keys`](keys/index.html)
//! * multiplicative-to-additive share conversion, see [`mta`](mta/index.html)
//! * the messages exchanged by signing parties, see [`messages`](messages/index.html)
//! * the party which runs one signing session, see [`signing`](signing/index.html)
//!
use curv::arithmetic::traits::{Samplable, ZeroizeBN};
use curv::cryptographic_primitives::commitments::hash_commitment::HashCommitment;
use curv::cryptographic_primitives::commitments::traits::Commitment;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::{
    is_prime, Decrypt, DecryptionKey, EncryptionKey, KeyGeneration, Paillier, RawCiphertext,
    RawPlaintext,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use trace::trace;
use zeroize::Zeroize;

pub mod keys;
pub mod messages;
pub mod mta;
pub mod signing;

/// The hash of the message mapped to the scalar field of the curve
pub type MessageHashType = FE;

/// Maps arbitrary bytes to [`MessageHashType`] using SHA-256
///
/// The signing protocol does not deal with messages directly. A message has to be hashed and then mapped to a field element using a hash function
/// $` H : \{ 0,1 \} ^{*} \to Z_{q} `$ . Callers who use another hash function may build the scalar themselves.
pub fn hash_message(message: &[u8]) -> MessageHashType {
    let mut hasher = Sha256::new();
    hasher.input(message);
    ECScalar::from(&BigInt::from(hasher.result().as_slice()))
}

pub(crate) fn is_valid_curve_point(pk: curv::PK) -> bool {
    curv::PK::from_slice(&pk.serialize_uncompressed()).is_ok()
}

/// $` H^{\prime}(R) = R_{x} \mod q `$, `None` for a point without affine coordinates
pub(crate) fn x_coordinate_mod_q(point: &GE) -> Option<FE> {
    point
        .x_coor()
        .map(|x| ECScalar::from(&x.mod_floor(&FE::q())))
}

/// Public/private key pair for additive homomorphic encryption schema
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PaillierKeys {
    pub dk: DecryptionKey,
    pub ek: EncryptionKey,
}

impl Zeroize for PaillierKeys {
    fn zeroize(&mut self) {
        self.dk.p.zeroize_bn();
        self.dk.q.zeroize_bn();
        self.ek.n.zeroize_bn();
        self.ek.nn.zeroize_bn();
    }
}

impl Drop for PaillierKeys {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl PaillierKeys {
    /// produces new Paillier key pair
    pub fn random() -> Self {
        let (ek, dk) =
            Paillier::keypair_with_modulus_size(2 * PRIME_BIT_LENGTH_IN_PAILLIER_SCHEMA).keys();
        Self { ek, dk }
    }

    /// decrypts given value `c`
    pub fn decrypt(&self, c: &BigInt) -> BigInt {
        let plain: RawPlaintext = Paillier::decrypt(&self.dk, RawCiphertext::from(c));
        plain.0.into_owned()
    }

    /// checks whether Paillier's setup is valid and consistent
    #[trace(pretty, prefix = "PaillierKeys::")]
    pub fn is_valid(ek: &EncryptionKey, dk: &DecryptionKey) -> bool {
        is_prime(&dk.p)
            && is_prime(&dk.q)
            && ek.n == dk.p.borrow() * dk.q.borrow()
            && ek.nn == ek.n.pow(2)
    }
}

impl Display for PaillierKeys {
    /// hides private key of the schema
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierKeys")
            .field("dk", &"[***]".to_owned())
            .field("ek", &self.ek)
            .finish()
    }
}

impl Debug for PaillierKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

///current recommended bit size for the primes in Paillier schema
pub const PRIME_BIT_LENGTH_IN_PAILLIER_SCHEMA: usize = 1024;

/// The result of ECDSA signing algorithm
///
/// The signature the schema with
///
/// * cyclic group $` \mathcal{G} `$ of prime order $`q`$ and generator $` g `$
/// * message $` m `$ , private key $` x `$
/// * mapping $` F : \mathcal{G} \to \mathbb{Z}_q `$, hash function $` H(t) `$
/// * random  $` k \in \mathbb{Z}_{q} `$
///
/// The signature contains
/// ```math
///    r = F(g^k) , \space s = k^{-1}(H(m) + x r) \mod q
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub r: FE,
    pub s: FE,
}

impl Signature {
    /// verifies the signature using public key and the hash of the message
    pub fn verify(&self, pubkey: &GE, message: &MessageHashType) -> bool {
        if self.s == FE::zero() || self.r == FE::zero() {
            false
        } else {
            let g: GE = ECPoint::generator();

            let s_invert = self.s.invert();
            let u1 = (*message) * s_invert;
            let u2 = self.r * s_invert;

            match x_coordinate_mod_q(&(g * u1 + pubkey * &u2)) {
                Some(x) => self.r == x,
                None => false,
            }
        }
    }

    /// returns `true` if `s` lies in the upper half of $` Z_{q} `$
    pub fn is_high_s(&self) -> bool {
        self.s.to_big_int() > FE::q().div_floor(&BigInt::from(2))
    }

    /// replaces `s` with `q - s` if `s` is high, returns `true` if the replacement took place
    ///
    /// Both values verify, but only the lower one is accepted by the consensus rules of major blockchains.
    pub fn normalize_s(&mut self) -> bool {
        if self.is_high_s() {
            self.s = FE::zero().sub(&self.s.get_element());
            true
        } else {
            false
        }
    }
}

/// Recovery id of a signature whose nonce point is `R`
///
/// Bit 0 is the parity of $` R_{y} `$, bit 1 is set when $` R_{x} \geq q `$.
/// The caller flips bit 0 if `s` gets negated afterwards.
#[allow(non_snake_case)]
pub fn recovery_id(R: &GE) -> Option<u8> {
    let x = R.x_coor()?;
    let y = R.y_coor()?;
    let mut id = 0u8;
    if y.mod_floor(&BigInt::from(2)) == BigInt::one() {
        id |= 1;
    }
    if x >= FE::q() {
        id |= 2;
    }
    Some(id)
}

///  Non-malleable commitment scheme
///
/// Commitment scheme based on hash commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CommitmentScheme {
    pub comm: BigInt,
    pub decomm: BigInt,
}

impl CommitmentScheme {
    /// creates commitment scheme from EC group element
    #[allow(non_snake_case)]
    pub fn from_GE(elem: &GE) -> Self {
        let decomm = BigInt::sample(256);
        let comm = HashCommitment::create_commitment_with_user_defined_randomness(
            &elem.bytes_compressed_to_big_int(),
            &decomm,
        );
        CommitmentScheme { comm, decomm }
    }

    /// creates commitment scheme from `BigInt`
    #[allow(non_snake_case)]
    pub fn from_BigInt(message: &BigInt) -> Self {
        let decomm = BigInt::sample(256);
        let comm = HashCommitment::create_commitment_with_user_defined_randomness(message, &decomm);
        CommitmentScheme { comm, decomm }
    }

    /// verifies commitment using EC group element
    pub fn verify_commitment(&self, elem: GE) -> bool {
        is_valid_curve_point(elem.get_element())
            && HashCommitment::create_commitment_with_user_defined_randomness(
                &elem.bytes_compressed_to_big_int(),
                &self.decomm,
            ) == self.comm
    }

    /// verifies commitment using `BigInt` value
    pub fn verify_hash(&self, hash: &BigInt) -> bool {
        HashCommitment::create_commitment_with_user_defined_randomness(&hash, &self.decomm)
            == self.comm
    }
}
